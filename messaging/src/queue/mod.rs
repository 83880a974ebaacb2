//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - Message types for the fixed four-queue topology
//! - Async publisher with correlation header propagation
//! - Consumers with context recovery, ack/nack policy, and bind retry
//!
//! ## Topology
//!
//! ```text
//! services → events            → audit/consumers
//! services → email_notifications → email service
//! url service → preview_jobs   → preview worker → preview_results → url service
//! ```

pub mod consumer;
pub mod headers;
pub mod publisher;
pub mod types;

pub use consumer::{
    consume_email_notifications, consume_events, consume_preview_jobs, consume_preview_results,
    ConsumeOptions, DEFAULT_RETRY_INTERVAL,
};
pub use publisher::EventPublisher;
pub use types::{
    EmailNotification, Event, PreviewJob, PreviewResult, UrlEventPayload, UserRegisteredPayload,
    ALL_QUEUES, EMAIL_QUEUE, EVENTS_QUEUE, PREVIEW_JOBS_QUEUE, PREVIEW_RESULTS_QUEUE,
};
