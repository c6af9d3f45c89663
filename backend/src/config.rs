//! Server configuration.
//!
//! Every option can come from the command line or from the environment
//! (`.env` is loaded by the binary before parsing).

use clap::Args;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::parser::DEFAULT_ENCODING;

/// Options of `storefront serve`.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "STOREFRONT_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "STOREFRONT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// JSON fixture to seed the store with
    #[arg(long, env = "STOREFRONT_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Encoding of uploads that do not name one ("auto" to detect)
    #[arg(long, env = "STOREFRONT_DEFAULT_ENCODING", default_value = DEFAULT_ENCODING)]
    pub default_encoding: String,

    /// Seconds the products snapshot stays cached
    #[arg(long, env = "STOREFRONT_PRODUCTS_EXPORT_TTL", default_value_t = 300)]
    pub products_export_ttl: u64,

    /// Seconds a user's orders snapshot stays cached
    #[arg(long, env = "STOREFRONT_USER_ORDERS_TTL", default_value_t = 180)]
    pub user_orders_ttl: u64,

    /// Seconds a product list response stays cached
    #[arg(long, env = "STOREFRONT_PRODUCT_LIST_TTL", default_value_t = 120)]
    pub product_list_ttl: u64,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn products_export_ttl(&self) -> Duration {
        Duration::from_secs(self.products_export_ttl)
    }

    pub fn user_orders_ttl(&self) -> Duration {
        Duration::from_secs(self.user_orders_ttl)
    }

    pub fn product_list_ttl(&self) -> Duration {
        Duration::from_secs(self.product_list_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            fixture: None,
            default_encoding: DEFAULT_ENCODING.to_string(),
            products_export_ttl: 300,
            user_orders_ttl: 180,
            product_list_ttl: 120,
        }
    }
}
