//! BearLink messaging - shared RabbitMQ backbone for the BearLink services.
//!
//! This library is the publish/consume layer the BearLink microservices
//! coordinate through: queue topology, at-least-once delivery, reconnect and
//! bind retry on broker outage, and correlation-context propagation for log
//! correlation. Route handlers, persistence, and the GUI live in the
//! collaborating services.
//!
//! ## Architecture
//!
//! ```text
//! services → events              → audit/consumers
//! services → email_notifications → email service
//! url service → preview_jobs → preview worker → preview_results → url service
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod preview;
pub mod queue;

// Re-export commonly used types
pub use config::Config;
pub use connection::{BrokerConnection, ConnectionState};
pub use context::{current, generate_correlation_id, run_with_context, CorrelationContext};
pub use error::MessagingError;
pub use preview::{extract_metadata, fetch_preview, PreviewMetadata};
pub use queue::{
    consume_email_notifications, consume_events, consume_preview_jobs, consume_preview_results,
    ConsumeOptions, EmailNotification, Event, EventPublisher, PreviewJob, PreviewResult,
    UrlEventPayload, UserRegisteredPayload, EMAIL_QUEUE, EVENTS_QUEUE, PREVIEW_JOBS_QUEUE,
    PREVIEW_RESULTS_QUEUE,
};
