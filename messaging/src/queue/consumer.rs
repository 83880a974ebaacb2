//! Queue consumers with context recovery, ack/nack policy, and bind retry.
//!
//! Per delivery: recover the correlation context from headers (synthesizing a
//! fresh id when absent), enter a context scope, decode the JSON body, invoke
//! the handler, then ack on success or nack on failure. The requeue policy is
//! fixed per queue: `events` and `email_notifications` requeue failures for
//! transient retry; `preview_jobs` and `preview_results` drop them, since a
//! malformed producer message would otherwise loop forever.
//!
//! If declaring the queue or starting the consume fails, or the delivery
//! stream ends, the whole bind-and-consume sequence is rescheduled after a
//! fixed interval, indefinitely. Availability wins over fast failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Consumer,
};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use super::headers::extract_context;
use super::types::{
    EmailNotification, Event, PreviewJob, PreviewResult, EMAIL_QUEUE, EVENTS_QUEUE,
    PREVIEW_JOBS_QUEUE, PREVIEW_RESULTS_QUEUE,
};
use crate::context::{generate_correlation_id, run_with_context, CorrelationContext};

/// Default interval between bind-and-consume attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// Options shared by all consume entry points.
#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    /// This service's name, used as consumer tag and in recovered contexts
    pub service_name: String,
    /// Interval between bind-and-consume attempts
    pub retry_interval: Duration,
}

impl ConsumeOptions {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

/// Consume domain events from the `events` queue. Failures requeue.
pub async fn consume_events<F, Fut>(channel: Channel, handler: F, opts: ConsumeOptions)
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    consume_queue(channel, EVENTS_QUEUE, true, handler, opts).await
}

/// Consume email jobs from `email_notifications`. Failures requeue.
pub async fn consume_email_notifications<F, Fut>(
    channel: Channel,
    handler: F,
    opts: ConsumeOptions,
) where
    F: Fn(EmailNotification) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    consume_queue(channel, EMAIL_QUEUE, true, handler, opts).await
}

/// Consume preview fetch requests from `preview_jobs`. Failures are dropped.
pub async fn consume_preview_jobs<F, Fut>(channel: Channel, handler: F, opts: ConsumeOptions)
where
    F: Fn(PreviewJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    consume_queue(channel, PREVIEW_JOBS_QUEUE, false, handler, opts).await
}

/// Consume preview fetch results from `preview_results`. Failures are dropped.
pub async fn consume_preview_results<F, Fut>(channel: Channel, handler: F, opts: ConsumeOptions)
where
    F: Fn(PreviewResult) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    consume_queue(channel, PREVIEW_RESULTS_QUEUE, false, handler, opts).await
}

/// Final disposition of one delivery. Exactly one of ack or nack per delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryOutcome {
    Ack,
    Nack { requeue: bool },
}

/// Handle one delivery: recover context, decode, invoke, decide.
///
/// Pure with respect to the broker, so the ack/nack policy and context
/// recovery are testable without a channel.
pub(crate) async fn process_delivery<T, F, Fut>(
    queue: &str,
    data: &[u8],
    headers: Option<&FieldTable>,
    service_name: &str,
    requeue_on_failure: bool,
    handler: &F,
) -> DeliveryOutcome
where
    T: DeserializeOwned,
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let (correlation_id, source_service) = extract_context(headers);
    // Headerless messages each get a fresh id; unrelated deliveries never share one.
    let correlation_id = correlation_id.unwrap_or_else(generate_correlation_id);
    let context =
        CorrelationContext::new(correlation_id.clone(), service_name.to_string(), source_service);

    run_with_context(context, async move {
        let message: T = match serde_json::from_slice(data) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    queue = queue,
                    correlation_id = %correlation_id,
                    error = %e,
                    "message_decode_failed"
                );
                return DeliveryOutcome::Nack {
                    requeue: requeue_on_failure,
                };
            }
        };

        match handler(message).await {
            Ok(()) => DeliveryOutcome::Ack,
            Err(e) => {
                error!(
                    queue = queue,
                    correlation_id = %correlation_id,
                    error = %e,
                    "handler_failed"
                );
                DeliveryOutcome::Nack {
                    requeue: requeue_on_failure,
                }
            }
        }
    })
    .await
}

/// Bind to a queue and consume deliveries until the stream ends, retrying the
/// whole sequence at a fixed interval forever.
async fn consume_queue<T, F, Fut>(
    channel: Channel,
    queue: &'static str,
    requeue_on_failure: bool,
    handler: F,
    opts: ConsumeOptions,
) where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    let handler = Arc::new(handler);

    loop {
        let mut consumer = retry_bind(queue, opts.retry_interval, || {
            bind(&channel, queue, &opts.service_name)
        })
        .await;

        info!(queue = queue, "queue_consumer_started");

        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    let channel = channel.clone();
                    let handler = Arc::clone(&handler);
                    let service_name = opts.service_name.clone();

                    // Handler invocations may overlap; each delivery gets its own task.
                    tokio::spawn(async move {
                        let outcome = process_delivery(
                            queue,
                            &delivery.data,
                            delivery.properties.headers().as_ref(),
                            &service_name,
                            requeue_on_failure,
                            handler.as_ref(),
                        )
                        .await;

                        match outcome {
                            DeliveryOutcome::Ack => {
                                if let Err(e) = channel
                                    .basic_ack(delivery.delivery_tag, BasicAckOptions::default())
                                    .await
                                {
                                    error!(
                                        queue = queue,
                                        delivery_tag = delivery.delivery_tag,
                                        error = %e,
                                        "rabbitmq_ack_failed"
                                    );
                                }
                            }
                            DeliveryOutcome::Nack { requeue } => {
                                if let Err(e) = channel
                                    .basic_nack(
                                        delivery.delivery_tag,
                                        BasicNackOptions {
                                            requeue,
                                            ..Default::default()
                                        },
                                    )
                                    .await
                                {
                                    error!(
                                        queue = queue,
                                        delivery_tag = delivery.delivery_tag,
                                        error = %e,
                                        "rabbitmq_nack_failed"
                                    );
                                }
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(queue = queue, error = %e, "rabbitmq_delivery_error");
                }
            }
        }

        warn!(
            queue = queue,
            retry_ms = opts.retry_interval.as_millis() as u64,
            "queue_consumer_closed"
        );
        tokio::time::sleep(opts.retry_interval).await;
    }
}

/// Repeat a bind attempt at a fixed interval until it succeeds.
///
/// Every failure is logged and rescheduled, indefinitely; a consumer never
/// gives up on its queue.
async fn retry_bind<T, E, B, Fut>(queue: &str, retry_interval: Duration, mut bind: B) -> T
where
    E: std::fmt::Display,
    B: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match bind().await {
            Ok(bound) => return bound,
            Err(e) => {
                warn!(
                    queue = queue,
                    retry_ms = retry_interval.as_millis() as u64,
                    error = %e,
                    "queue_bind_failed"
                );
                tokio::time::sleep(retry_interval).await;
            }
        }
    }
}

async fn bind(
    channel: &Channel,
    queue: &str,
    consumer_tag: &str,
) -> Result<Consumer, lapin::Error> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .basic_consume(
            queue,
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
}
