use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use shopper::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for shopper::AppCommand {
    fn from(cmd: Commands) -> shopper::AppCommand {
        match cmd {
            Commands::Rates => shopper::AppCommand::Rates,
            Commands::Convert {
                amount,
                from,
                to,
                reverse,
                save,
            } => shopper::AppCommand::Convert {
                amount,
                from,
                to,
                reverse,
                save,
            },
            Commands::History => shopper::AppCommand::History,
            Commands::Note { id, store, rating } => shopper::AppCommand::Note { id, store, rating },
            Commands::Photo { id, slot, file } => shopper::AppCommand::Photo { id, slot, file },
            Commands::Remove { id } => shopper::AppCommand::Remove { id },
            Commands::Clear => shopper::AppCommand::Clear,
            Commands::Currencies { term } => shopper::AppCommand::Currencies { term },
            Commands::Watch => shopper::AppCommand::Watch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch and display the latest exchange rates
    Rates,
    /// Convert an amount between two currencies
    Convert {
        /// Amount to convert
        amount: String,
        /// Currency to convert from (defaults to the last used)
        #[arg(short, long)]
        from: Option<String>,
        /// Currency to convert to (defaults to the last used)
        #[arg(short, long)]
        to: Option<String>,
        /// Swap the from and to currencies
        #[arg(short, long)]
        reverse: bool,
        /// Save the conversion to history
        #[arg(short, long)]
        save: bool,
    },
    /// Display saved conversions
    History,
    /// Set the store name or rating of a saved conversion
    Note {
        id: i64,
        /// Store where the purchase happened
        #[arg(long)]
        store: Option<String>,
        /// Rating from 0 to 5
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=5))]
        rating: Option<u8>,
    },
    /// Attach a photo to a saved conversion, or clear the slot without --file.
    /// Slot 2 can be filled once slot 1 holds a photo; clearing slot 1 moves
    /// the second photo into it.
    Photo {
        id: i64,
        /// Photo slot, 1 or 2
        #[arg(value_parser = clap::value_parser!(u8).range(1..=2))]
        slot: u8,
        /// Image to attach
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Delete a saved conversion
    Remove { id: i64 },
    /// Delete all saved conversions
    Clear,
    /// List supported currencies, optionally filtered
    Currencies { term: Option<String> },
    /// Keep refreshing exchange rates until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => shopper::cli::setup::setup(),
        Some(cmd) => shopper::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
