//! BearLink Preview Worker - consumes preview fetch jobs from RabbitMQ.
//!
//! For each job on the preview_jobs queue this worker fetches the target page,
//! extracts its metadata, and publishes the result to preview_results, carrying
//! the job's correlation id through to the result message.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bearlink::{
    consume_preview_jobs, fetch_preview, BrokerConnection, Config, ConsumeOptions, EventPublisher,
    PreviewJob, PreviewResult,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("preview_worker_starting");

    let config = Config::from_env();
    info!(
        service_name = %config.service_name,
        connect_max_attempts = config.connect_max_attempts,
        bind_retry_ms = config.bind_retry_ms,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let connection = BrokerConnection::new(&config);

    // Bounded retry; after exhaustion the worker stays up degraded, where
    // publishes are no-ops and no jobs are consumed until restart.
    if let Err(e) = connection.connect().await {
        error!(error = %e, "rabbitmq_degraded_mode");
    }

    let publisher = EventPublisher::new(connection.clone());

    let client = Client::builder()
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to create HTTP client")?;

    let timeout = Duration::from_millis(config.request_timeout_ms);

    let handler = {
        let publisher = publisher.clone();
        let client = client.clone();
        move |job: PreviewJob| {
            let publisher = publisher.clone();
            let client = client.clone();
            async move {
                info!(url_id = job.url_id, url = %job.original_url, "preview_job_received");

                let metadata = fetch_preview(&client, &job.original_url, timeout).await;

                let result = PreviewResult {
                    url_id: job.url_id,
                    title: metadata.title,
                    description: metadata.description,
                    image: metadata.image,
                    favicon: metadata.favicon,
                };

                publisher
                    .publish_preview_result(&result)
                    .await
                    .context("Failed to publish preview result")?;

                info!(url_id = job.url_id, "preview_job_completed");
                Ok(())
            }
        }
    };

    let opts = ConsumeOptions::new(config.service_name.as_str())
        .with_retry_interval(Duration::from_millis(config.bind_retry_ms));

    match connection.channel().await {
        Some(channel) => {
            info!("preview_worker_ready");
            tokio::select! {
                _ = consume_preview_jobs(channel, handler, opts) => {}
                _ = shutdown_signal() => info!("preview_worker_stopping"),
            }
        }
        None => {
            // Degraded: nothing to consume, wait for the operator to restart us
            shutdown_signal().await;
            info!("preview_worker_stopping");
        }
    }

    connection.close().await;
    info!("preview_worker_shutdown_complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
