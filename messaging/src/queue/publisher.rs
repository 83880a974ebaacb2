//! Event publisher with correlation header propagation.
//!
//! Every publish attaches the active correlation context (if any) as
//! `x-correlation-id` / `x-source-service` headers. When the connection is
//! degraded (no live channel) the publish is logged and dropped, so broker
//! outages never propagate as errors into business logic.

use lapin::{options::BasicPublishOptions, BasicProperties};
use tracing::{info, warn};

use super::headers::correlation_headers;
use super::types::{
    EmailNotification, Event, PreviewJob, PreviewResult, UrlEventPayload, UserRegisteredPayload,
    EMAIL_QUEUE, EVENTS_QUEUE, PREVIEW_JOBS_QUEUE, PREVIEW_RESULTS_QUEUE,
};
use crate::connection::BrokerConnection;
use crate::error::MessagingError;

/// Publisher for all BearLink queues, sharing the service's broker connection.
#[derive(Clone)]
pub struct EventPublisher {
    connection: BrokerConnection,
}

impl EventPublisher {
    pub fn new(connection: BrokerConnection) -> Self {
        Self { connection }
    }

    /// Publish a domain event envelope to the `events` queue.
    pub async fn publish_event(&self, event: &Event) -> Result<(), MessagingError> {
        let body = serde_json::to_vec(event)?;
        self.send(EVENTS_QUEUE, body, event.event_type()).await
    }

    pub async fn publish_user_registered(
        &self,
        payload: UserRegisteredPayload,
    ) -> Result<(), MessagingError> {
        self.publish_event(&Event::UserRegistered(payload)).await
    }

    pub async fn publish_url_created(
        &self,
        payload: UrlEventPayload,
    ) -> Result<(), MessagingError> {
        self.publish_event(&Event::UrlCreated(payload)).await
    }

    pub async fn publish_url_updated(
        &self,
        payload: UrlEventPayload,
    ) -> Result<(), MessagingError> {
        self.publish_event(&Event::UrlUpdated(payload)).await
    }

    pub async fn publish_url_deleted(
        &self,
        payload: UrlEventPayload,
    ) -> Result<(), MessagingError> {
        self.publish_event(&Event::UrlDeleted(payload)).await
    }

    pub async fn publish_url_clicked(
        &self,
        payload: UrlEventPayload,
    ) -> Result<(), MessagingError> {
        self.publish_event(&Event::UrlClicked(payload)).await
    }

    /// Publish an email job bare (no envelope) to `email_notifications`.
    pub async fn publish_email_notification(
        &self,
        payload: &EmailNotification,
    ) -> Result<(), MessagingError> {
        let body = serde_json::to_vec(payload)?;
        self.send(EMAIL_QUEUE, body, "email_notification").await
    }

    /// Publish a preview fetch request to `preview_jobs`.
    pub async fn publish_preview_job(&self, job: &PreviewJob) -> Result<(), MessagingError> {
        let body = serde_json::to_vec(job)?;
        self.send(PREVIEW_JOBS_QUEUE, body, "preview_job").await
    }

    /// Publish a preview fetch result to `preview_results`.
    pub async fn publish_preview_result(
        &self,
        result: &PreviewResult,
    ) -> Result<(), MessagingError> {
        let body = serde_json::to_vec(result)?;
        self.send(PREVIEW_RESULTS_QUEUE, body, "preview_result").await
    }

    async fn send(
        &self,
        queue: &'static str,
        body: Vec<u8>,
        kind: &str,
    ) -> Result<(), MessagingError> {
        // Degraded mode: no live channel means the message is dropped, not an error.
        let Some(channel) = self.connection.channel().await else {
            warn!(queue = queue, kind = kind, "publish_dropped_no_channel");
            return Ok(());
        };

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_headers(correlation_headers()),
            )
            .await?
            .await?;

        info!(
            queue = queue,
            kind = kind,
            body_length = body.len(),
            "message_published"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::ConnectionState;

    fn disconnected_publisher() -> EventPublisher {
        let config = Config::from_env();
        EventPublisher::new(BrokerConnection::new(&config))
    }

    #[tokio::test]
    async fn test_publish_is_noop_when_disconnected() {
        let publisher = disconnected_publisher();
        assert_eq!(
            publisher.connection.state().await,
            ConnectionState::Disconnected
        );

        let result = publisher
            .publish_url_created(UrlEventPayload {
                id: 1,
                short_id: "abc123".to_string(),
                original_url: None,
                user_id: None,
            })
            .await;

        // Dropped, never surfaced as an error to the call site
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_email_publish_is_noop_when_disconnected() {
        let publisher = disconnected_publisher();

        let result = publisher
            .publish_email_notification(&EmailNotification {
                to: "user@example.com".to_string(),
                subject: "Welcome".to_string(),
                body: None,
                template: None,
            })
            .await;

        assert!(result.is_ok());
    }
}
