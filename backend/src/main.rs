//! Storefront CLI
//!
//! ```bash
//! storefront serve                          # Start HTTP server (port 3000)
//! storefront serve --fixture shop.json      # ...seeded from a fixture
//! storefront parse products.csv             # Print decoded rows as JSON
//! storefront check orders orders.csv --fixture shop.json
//!                                           # Dry-run an import, print the records
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use storefront::api::{order_views, product_views};
use storefront::parser::{AUTO_ENCODING, DEFAULT_ENCODING};
use storefront::{import_bytes, parse_bytes, Config, Fixture, MemoryStore, Order, Product};

const DEFAULT_LOG_FILTER: &str = "storefront=info,tower_http=info";

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront backend with CSV bulk import/export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve(Config),

    /// Parse a CSV file and output its rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Encoding label ("auto" to detect)
        #[arg(short, long, default_value = AUTO_ENCODING)]
        encoding: String,
    },

    /// Import a CSV file into a scratch store and output the records
    Check {
        /// What the file contains
        entity: Entity,

        /// Input CSV file
        input: PathBuf,

        /// Encoding label ("auto" to detect)
        #[arg(short, long, default_value = DEFAULT_ENCODING)]
        encoding: String,

        /// JSON fixture with the users (and products) rows refer to
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Entity {
    Products,
    Orders,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(config) => storefront::server::start_server(config).await,
        Commands::Parse { input, encoding } => cmd_parse(&input, &encoding),
        Commands::Check {
            entity,
            input,
            encoding,
            fixture,
        } => cmd_check(entity, &input, &encoding, fixture.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so command output on stdout stays clean JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_parse(input: &Path, encoding: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let bytes = fs::read(input)?;
    let result = parse_bytes(&bytes, encoding)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} rows", result.rows.len());

    println!("{}", serde_json::to_string_pretty(&result.rows)?);
    Ok(())
}

fn cmd_check(
    entity: Entity,
    input: &Path,
    encoding: &str,
    fixture: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Checking import: {}", input.display());

    let store = match fixture {
        Some(path) => MemoryStore::from_fixture(Fixture::from_file(path)?)?,
        None => MemoryStore::new(),
    };
    let bytes = fs::read(input)?;

    let json = match entity {
        Entity::Products => {
            let products = import_bytes::<Product>(&bytes, encoding, &store, &store)?;
            eprintln!("✅ {} products would be imported", products.len());
            serde_json::to_string_pretty(&product_views(&products))?
        }
        Entity::Orders => {
            let orders = import_bytes::<Order>(&bytes, encoding, &store, &store)?;
            eprintln!("✅ {} orders would be imported", orders.len());
            serde_json::to_string_pretty(&order_views(&orders))?
        }
    };

    println!("{}", json);
    Ok(())
}
