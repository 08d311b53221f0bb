//! Arca partner tools - main entry point.

use std::process;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use arca_partner::options::Options;
use arca_partner::{commands, EXIT_NO_OP, EXIT_USER_ERR};

#[derive(Parser)]
#[command(
    name = "arca-partner",
    about = "Partner tools for Arca preservation storage",
    version
)]
struct Cli {
    /// Path to the partner config file (default: ~/.partner.conf)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Storage region to connect to
    #[arg(long, global = true, default_value = "us-east-1")]
    region: String,

    /// The bucket to operate on
    #[arg(long, global = true, default_value = "")]
    bucket: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete one or more keys from the bucket
    Delete {
        /// Keys (object names) to delete
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Show size, checksums, and restore status for a key
    Head {
        /// The key to look up
        key: String,
    },
    /// List keys in the bucket
    List {
        /// Only keys starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,

        /// Maximum number of keys to print
        #[arg(long, default_value_t = 1000)]
        limit: i32,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            // Help and version print and claim their own exit code.
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                process::exit(EXIT_NO_OP);
            }
            _ => {
                let _ = e.print();
                process::exit(EXIT_USER_ERR);
            }
        },
    };

    let opts = match Options::resolve(cli.config.as_deref(), &cli.region, &cli.bucket) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(EXIT_USER_ERR);
        }
    };

    let exit_code = match &cli.command {
        Command::Delete { keys } => commands::delete(&opts, keys).await,
        Command::Head { key } => commands::head(&opts, key).await,
        Command::List { prefix, limit } => commands::list(&opts, prefix, *limit).await,
    };
    process::exit(exit_code);
}
