use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use finsync_client::{
    Alert, AlertLevel, AlertSink, ApiClient, CliConfig, ClientConfig, ClientSession, FileConfig,
    NotificationService, NotificationStore, StaticTokenProvider, TokenProvider,
};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Base URL of the FinSync server (e.g. https://finsync.example.com).
    #[clap(long)]
    pub base_url: Option<String>,

    /// Bearer token used for API requests and the push channel.
    #[clap(long)]
    pub token: Option<String>,

    /// Path to a TOML config file. Values there override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Timeout in seconds for API requests.
    #[clap(long, default_value_t = 30)]
    pub request_timeout_sec: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the push channel and print notifications as they arrive.
    Watch,

    /// Fetch the notification backlog and print it.
    List,

    /// Mark every notification as read.
    MarkRead,

    /// Delete the notification with the given id.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!(
        "finsync-notify {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        base_url: cli_args.base_url.clone(),
        token: cli_args.token.clone(),
        request_timeout_sec: cli_args.request_timeout_sec,
    };
    let config = ClientConfig::resolve(&cli_config, file_config)?;

    let tokens: Arc<dyn TokenProvider> = match &config.token {
        Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        None => Arc::new(StaticTokenProvider::logged_out()),
    };

    match cli_args.command {
        Command::Watch => watch(&config, tokens).await,
        Command::List => list(&config, tokens).await,
        Command::MarkRead => mark_read(&config, tokens).await,
        Command::Delete { id } => delete(&config, tokens, &id).await,
    }
}

/// Bring up a full session and tail the alert stream until Ctrl-C.
async fn watch(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<()> {
    let session = ClientSession::start(config, tokens).await;
    let mut alerts = session.alerts().subscribe();

    print_snapshot(&session.store());
    info!("Watching for notifications, press Ctrl-C to stop");

    loop {
        tokio::select! {
            alert = alerts.recv() => match alert {
                Ok(alert) => print_alert(&alert),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Alert stream lagged, {} alerts dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn list(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<()> {
    let (store, service, alerts) = rest_service(config, tokens);
    let mut alerts_rx = alerts.subscribe();

    service.load_initial().await;

    drain_alerts(&mut alerts_rx);
    print_snapshot(&store);
    Ok(())
}

async fn mark_read(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<()> {
    let (store, service, alerts) = rest_service(config, tokens);
    let mut alerts_rx = alerts.subscribe();

    // The mark-all-read precondition reads the store, so fill it first.
    service.load_initial().await;
    let unread = store.unread_count();
    if unread == 0 {
        println!("Nothing unread");
        return Ok(());
    }

    service.mark_all_read().await;
    if drain_alerts(&mut alerts_rx) == 0 {
        println!("{} notifications marked as read", unread);
    }
    Ok(())
}

async fn delete(config: &ClientConfig, tokens: Arc<dyn TokenProvider>, id: &str) -> Result<()> {
    let (_store, service, alerts) = rest_service(config, tokens);
    let mut alerts_rx = alerts.subscribe();

    service.delete(id).await;

    if drain_alerts(&mut alerts_rx) == 0 {
        println!("Deleted {}", id);
    }
    Ok(())
}

/// Store, service and alert sink without a push channel, for the one-shot
/// subcommands.
fn rest_service(
    config: &ClientConfig,
    tokens: Arc<dyn TokenProvider>,
) -> (Arc<NotificationStore>, Arc<NotificationService>, AlertSink) {
    let store = Arc::new(NotificationStore::new());
    let alerts = AlertSink::default();
    let api = Arc::new(ApiClient::new(
        config.base_url.clone(),
        config.request_timeout_sec,
        tokens,
    ));
    let service = Arc::new(NotificationService::new(
        store.clone(),
        api,
        alerts.clone(),
    ));
    (store, service, alerts)
}

fn print_snapshot(store: &NotificationStore) {
    let records = store.snapshot();
    if records.is_empty() {
        println!("No notifications");
        return;
    }
    for record in records {
        let marker = if record.read { ' ' } else { '*' };
        let when = record.created_at.format("%Y-%m-%d %H:%M");
        match &record.link {
            Some(link) => println!("{} {}  {}  {} ({})", marker, when, record.id, record.message, link),
            None => println!("{} {}  {}  {}", marker, when, record.id, record.message),
        }
    }
    println!("{} unread", store.unread_count());
}

fn print_alert(alert: &Alert) {
    match alert.level {
        AlertLevel::Info => println!("* {}", alert.message),
        AlertLevel::Error => eprintln!("! {}", alert.message),
    }
}

/// Print alerts queued so far and return how many were errors.
fn drain_alerts(alerts_rx: &mut broadcast::Receiver<Alert>) -> usize {
    let mut errors = 0;
    while let Ok(alert) = alerts_rx.try_recv() {
        if alert.level == AlertLevel::Error {
            errors += 1;
        }
        print_alert(&alert);
    }
    errors
}
