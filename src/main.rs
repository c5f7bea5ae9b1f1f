use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice_notifier::accounting::XeroClient;
use invoice_notifier::auth::{CredentialLeaseManager, HttpTokenExchange};
use invoice_notifier::config::{Config, ConfigError};
use invoice_notifier::idempotency::{IdempotencyTracker, TrackerError};
use invoice_notifier::notify::{HttpMailer, LogNotifier, Mailer};
use invoice_notifier::queue::DurableQueue;
use invoice_notifier::server::{AppState, build_router};
use invoice_notifier::worker::{Processor, Worker};

/// Upper bound on any single upstream HTTP request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_notifier=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    info!(?config, "Starting invoice notifier");

    std::fs::create_dir_all(&config.state_dir)?;

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let exchange = HttpTokenExchange::new(
        http.clone(),
        &config.token_url,
        &config.client_id,
        &config.client_secret,
    );
    let credentials = Arc::new(CredentialLeaseManager::in_dir(&config.state_dir, exchange));
    if !credentials.path().exists() {
        warn!(
            path = %credentials.path().display(),
            "No credential lease yet; events will stay queued until one is provisioned"
        );
    }
    let api = XeroClient::new(http.clone(), &config.api_base, credentials);

    let mailer = match &config.mail {
        Some(mail) => Mailer::Http(HttpMailer::new(
            http.clone(),
            &mail.url,
            mail.api_key.clone(),
            &mail.from,
        )),
        None => {
            info!("MAIL_API_URL not set, notifications will only be logged");
            Mailer::DryRun(LogNotifier)
        }
    };

    let queue = Arc::new(DurableQueue::in_dir(&config.state_dir));
    let tracker = Arc::new(IdempotencyTracker::load_in_dir(&config.state_dir)?);

    let worker = Worker::new(
        queue.clone(),
        Processor::new(api, mailer, tracker),
        config.pacing,
    );

    let shutdown = CancellationToken::new();
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let app = build_router(AppState::new(queue, config.webhook_key.into_bytes()));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", config.listen_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Worker task failed");
    }

    served?;
    info!("Stopped");
    Ok(())
}

/// Resolves on Ctrl-C (or when something else cancels `token`), cancelling
/// `token` so the worker stops too.
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => error!(error = %e, "Cannot listen for Ctrl-C, shutting down"),
            }
        }
        _ = token.cancelled() => {}
    }
    token.cancel();
}
