use anyhow::Result;
use clap::{Parser, Subcommand};
use visitor_tracker::config::Config;
use visitor_tracker::storage;

#[derive(Parser)]
#[command(name = "visitor-admin")]
#[command(about = "Visitor tracker admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the visits table and indexes
    Init,
    /// Print the number of stored visits
    Count,
    /// List recent visits, newest first
    List {
        /// Maximum number of visits to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database).await?;

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Init => {
            println!("✅ Database initialized");
        }
        Commands::Count => {
            let count = storage.count().await?;
            println!("{} visits recorded", count);
        }
        Commands::List { limit } => {
            let visits = storage.list(limit.max(1), 0).await?;
            if visits.is_empty() {
                println!("No visits recorded");
            } else {
                println!(
                    "{:<25} {:<40} {:<30} {:<20} {:<20} {}",
                    "Time", "IP", "Location", "Browser", "OS", "Device"
                );
                println!("{}", "-".repeat(150));
                for visit in visits {
                    let location = format!(
                        "{}, {}, {}",
                        visit.location.city, visit.location.region, visit.location.country
                    );
                    println!(
                        "{:<25} {:<40} {:<30} {:<20} {:<20} {}",
                        visit.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                        visit.ip,
                        location,
                        visit.browser,
                        visit.os,
                        visit.device
                    );
                }
            }
        }
    }

    Ok(())
}
