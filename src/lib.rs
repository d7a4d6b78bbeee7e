pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::{ConversionLedger, KeyValueStorage, PairPreferences, RateProvider};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Rates,
    Convert {
        amount: String,
        from: Option<String>,
        to: Option<String>,
        reverse: bool,
        save: bool,
    },
    History,
    Note {
        id: i64,
        store: Option<String>,
        rating: Option<u8>,
    },
    Photo {
        id: i64,
        slot: u8,
        file: Option<PathBuf>,
    },
    Remove {
        id: i64,
    },
    Clear,
    Currencies {
        term: Option<String>,
    },
    Watch,
}

/// The components a front end works with, built once at startup.
pub struct App {
    pub config: AppConfig,
    pub rates: Arc<RateProvider>,
    pub ledger: ConversionLedger,
    pub preferences: PairPreferences,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let data_path = config.default_data_path()?;
        let storage = store::open_or_memory(&data_path);
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: AppConfig, storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let source = providers::ExchangeRateApiSource::new(
            &config.providers.exchange_rate.base_url,
        )?
        .with_retries(config.retries, config.retry_delay_ms);

        let rates = Arc::new(RateProvider::new(
            Arc::new(source),
            Arc::clone(&storage),
            &config.base_currency,
            config.request_timeout(),
        ));
        let ledger = ConversionLedger::new(Arc::clone(&storage));
        let preferences = PairPreferences::new(storage);

        Ok(App {
            config,
            rates,
            ledger,
            preferences,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Global Shopper starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::new(config)?;
    run_with_app(&app, command).await
}

pub async fn run_with_app(app: &App, command: AppCommand) -> Result<()> {
    app.ledger.load().await;

    match command {
        AppCommand::Rates => cli::rates::run(app).await,
        AppCommand::Convert {
            amount,
            from,
            to,
            reverse,
            save,
        } => {
            let args = cli::convert::ConvertArgs {
                amount,
                from,
                to,
                reverse,
                save,
            };
            cli::convert::run(app, args).await
        }
        AppCommand::History => cli::history::show(app).await,
        AppCommand::Note { id, store, rating } => cli::history::note(app, id, store, rating).await,
        AppCommand::Photo { id, slot, file } => {
            cli::history::photo(app, id, slot, file.as_deref()).await
        }
        AppCommand::Remove { id } => cli::history::remove(app, id).await,
        AppCommand::Clear => cli::history::clear(app).await,
        AppCommand::Currencies { term } => {
            cli::currencies::run(term.as_deref());
            Ok(())
        }
        AppCommand::Watch => cli::watch::run(app).await,
    }
}
