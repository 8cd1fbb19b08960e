//! Command-line front end for mediascrape lookups.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use mediascrape::config::ScraperConfig;
use mediascrape::dispatch::{Dispatcher, SearchHierarchy};
use mediascrape::observability::init_tracing;

/// Looks up book and movie metadata.
#[derive(Parser, Debug)]
#[command(name = "mediascrape", version, about = "Book and movie metadata lookups")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a lookup and print the result as JSON
    Lookup {
        /// Category: book or movie
        category: String,
        /// Search type: isbn, title, ean or imdb_id
        search_type: String,
        /// Query text
        query: String,
        /// Locale for sources that localize, e.g. sv-SE
        #[arg(long)]
        locale: Option<String>,
    },
    /// Print the available categories and search types
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Categories => {
            let hierarchy = SearchHierarchy::global().to_dict();
            println!("{}", serde_json::to_string_pretty(&hierarchy)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Lookup {
            category,
            search_type,
            query,
            locale,
        } => {
            let mut config = ScraperConfig::from_env()?;
            config.logging.json |= cli.json_logs;
            init_tracing(&config.logging)?;

            let dispatcher = Dispatcher::from_config(&config)?;
            match dispatcher
                .search(&category, &search_type, &query, locale.as_deref())
                .await
            {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    println!("{}", serde_json::to_string_pretty(&err.to_dict())?);
                    eprintln!("{}", err.public_message());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
