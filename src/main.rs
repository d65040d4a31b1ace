mod analyzer;
mod catalog;
mod collector;
mod config;
mod dedup;
mod model;
mod normalizer;
mod notifier;
mod parser;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use crate::scraper::{HtmlFeedDriver, PageDriver, SimulatedFeed};
use analyzer::AnalyzerImpl;
use catalog::IntentCatalog;
use clap::Parser;
use config::{AppConfig, FeedConfig, load_config};
use futures::future::join_all;
use notifier::{LogNotifier, Notifier, TelegramNotifier};
use pipeline::Pipeline;
use std::sync::Arc;
use storage::SqliteStorage;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

#[derive(Debug, clap::Parser)]
#[command(name = "intent-sniper", about = "Harvest feed posts and rank them against intents")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Run a single batch even if check_interval_seconds is set
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    let args = Args::parse();

    let config: Arc<AppConfig> = match load_config(&args.config) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    // The catalog is validated before any collection work begins
    let catalog = match IntentCatalog::load(config.intent_groups()) {
        Ok(c) => c,
        Err(e) => {
            error!("Intent catalog error: {}", e);
            return;
        }
    };
    info!(
        "Loaded {} reference sentences across {} intents",
        catalog.len(),
        catalog.labels().len()
    );

    let storage = match SqliteStorage::new(&config.output.database) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            return;
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.engagement.telegram {
        Some(tg) => match TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id) {
            Ok(n) => match &tg.api_base {
                Some(base) => Arc::new(n.with_api_base(base)),
                None => Arc::new(n),
            },
            Err(e) => {
                error!("Failed to initialize Telegram notifier: {}", e);
                return;
            }
        },
        None => Arc::new(LogNotifier::new()),
    };

    info!("Sending startup message...");
    if let Err(e) = notifier.notify_text("🚀 IntentSniper started!").await {
        warn!("Startup notification failed: {}", e);
    }

    match &config.feed {
        FeedConfig::Html {
            url_template,
            user_agent,
            selectors,
        } => match HtmlFeedDriver::new(url_template, user_agent, selectors) {
            Ok(driver) => run(&driver, &catalog, storage, notifier, config.clone(), args.once).await,
            Err(e) => error!("Failed to initialize feed driver: {}", e),
        },
        FeedConfig::Simulated {
            posts,
            window,
            step,
            duplicate_rate,
            seed,
        } => {
            let driver = SimulatedFeed::new(posts.clone(), *window, *step, *duplicate_rate, *seed);
            run(&driver, &catalog, storage, notifier, config.clone(), args.once).await;
        }
    }
}

/// Processes every configured query, then repeats on the configured interval.
async fn run<D: PageDriver>(
    driver: &D,
    catalog: &IntentCatalog,
    storage: Arc<Mutex<SqliteStorage>>,
    notifier: Arc<dyn Notifier>,
    config: Arc<AppConfig>,
    once: bool,
) {
    let analyzer = AnalyzerImpl::new();
    let pipeline = Pipeline {
        driver,
        analyzer: &analyzer,
        catalog,
        storage,
        notifier,
        config: config.clone(),
    };

    loop {
        info!("Queries to process: {}", config.queries.len());

        let tasks: Vec<_> = config
            .queries
            .iter()
            .map(|query| pipeline.process_query(query))
            .collect();
        for summary in join_all(tasks).await {
            info!(
                "Query '{}': {:?}, {} collected, {} engaged | {} attempts, {} timeouts, {} noise, {} duplicates",
                summary.query,
                summary.termination,
                summary.collected,
                summary.engaged,
                summary.attempts,
                summary.timeouts,
                summary.noise,
                summary.duplicates
            );
        }

        let interval = match config.check_interval_seconds {
            Some(secs) if !once => secs,
            _ => break,
        };
        info!("Waiting {}s before the next batch...", interval);
        sleep(Duration::from_secs(interval)).await;
    }
}
