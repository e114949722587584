//! Bynona CLI - command-line shell over the storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password is read from stdin when not given)
//! bynona login -e mona@example.com
//!
//! # Browse the catalog
//! bynona brands
//! bynona products --sort offers --page 2
//! bynona search "face cream" --page 1
//!
//! # Type queries line by line and watch the debounced results
//! bynona search-live
//!
//! # Switch pricing and language
//! bynona price-mode toggle
//! bynona locale en
//! ```
//!
//! Configuration comes from `BYNONA_*` environment variables (see
//! `bynona_client::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use bynona_client::{BynonaClient, ClientConfig, SessionEvent};
use bynona_core::{BrandId, CategoryId, Locale};
use clap::{Parser, Subcommand, ValueEnum};
use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "bynona")]
#[command(author, version, about = "Bynona storefront shell")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the signed-in shopper
    Whoami,
    /// List brands
    Brands,
    /// List categories
    Categories,
    /// List products matching a filter
    Products {
        /// Sort key understood by the API (e.g. `offers`)
        #[arg(long)]
        sort: Option<String>,

        #[arg(long)]
        page: Option<u32>,

        /// Brand ID
        #[arg(long)]
        brand: Option<BrandId>,

        /// Category ID
        #[arg(long)]
        category: Option<CategoryId>,
    },
    /// List products on offer
    Offers,
    /// Run one search request
    Search {
        text: String,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Feed stdin lines into the debounced search pipeline
    SearchLive,
    /// Show or change the price mode
    PriceMode {
        #[arg(value_enum)]
        action: Option<PriceModeAction>,
    },
    /// Show or change the UI language
    Locale {
        /// `ar` or `en`
        locale: Option<Locale>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PriceModeAction {
    Retail,
    Wholesale,
    Toggle,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Warnings and errors become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            notice(&format!("Configuration error: {e}"));
            std::process::exit(1);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bynona_client=info,bynona_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = BynonaClient::from_config(config)?;
    let mut events = client.subscribe();

    let result = dispatch(cli.command, &client, config).await;
    report_session_events(&mut events);
    result?;
    Ok(())
}

async fn dispatch(
    command: Commands,
    client: &BynonaClient,
    config: &ClientConfig,
) -> Result<(), commands::CommandError> {
    match command {
        Commands::Login { email, password } => commands::auth::login(client, &email, password).await,
        Commands::Logout => commands::auth::logout(client).await,
        Commands::Whoami => commands::auth::whoami(client),
        Commands::Brands => commands::catalog::brands(client).await,
        Commands::Categories => commands::catalog::categories(client).await,
        Commands::Products {
            sort,
            page,
            brand,
            category,
        } => commands::catalog::products(client, sort, page, brand, category).await,
        Commands::Offers => commands::catalog::offers(client).await,
        Commands::Search { text, page } => commands::catalog::search(client, &text, page).await,
        Commands::SearchLive => commands::search_live::run(client.clone(), config.search).await,
        Commands::PriceMode { action } => commands::preferences::price_mode(client, action),
        Commands::Locale { locale } => commands::preferences::locale(client, locale),
    }
}

/// Print a hint for session changes the shopper did not ask for.
fn report_session_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::Expired {
            notice("Your session has expired. Run `bynona login` to sign in again.");
        }
    }
}

#[allow(clippy::print_stderr)]
fn notice(message: &str) {
    eprintln!("{message}");
}
