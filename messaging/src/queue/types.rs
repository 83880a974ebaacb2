//! Queue message types for the fixed BearLink queue topology.
//!
//! Four durable queues, each with one semantic contract:
//! - `events`: broadcast envelope `{type, payload}`, many publishers/consumers
//! - `email_notifications`: point-to-point job, bare payload without envelope
//! - `preview_jobs` / `preview_results`: paired request/response queues,
//!   correlated by `urlId` only
//!
//! Bodies are UTF-8 JSON with camelCase field names on the wire.

use serde::{Deserialize, Serialize};

/// Queue name for broadcast domain events.
pub const EVENTS_QUEUE: &str = "events";

/// Queue name for email notification jobs.
pub const EMAIL_QUEUE: &str = "email_notifications";

/// Queue name for preview fetch requests.
pub const PREVIEW_JOBS_QUEUE: &str = "preview_jobs";

/// Queue name for preview fetch results.
pub const PREVIEW_RESULTS_QUEUE: &str = "preview_results";

/// All queues, declared durable at connection time.
pub const ALL_QUEUES: [&str; 4] = [
    EVENTS_QUEUE,
    EMAIL_QUEUE,
    PREVIEW_JOBS_QUEUE,
    PREVIEW_RESULTS_QUEUE,
];

// =============================================================================
// Event envelope (events queue)
// =============================================================================

/// Domain event envelope, serialized as `{"type": "<tag>", "payload": {...}}`.
///
/// The tag vocabulary is closed: a message carrying an unknown tag fails to
/// decode and is nacked rather than silently accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    UserRegistered(UserRegisteredPayload),
    UrlCreated(UrlEventPayload),
    UrlUpdated(UrlEventPayload),
    UrlDeleted(UrlEventPayload),
    UrlClicked(UrlEventPayload),
}

impl Event {
    /// The wire tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::UserRegistered(_) => "user_registered",
            Event::UrlCreated(_) => "url_created",
            Event::UrlUpdated(_) => "url_updated",
            Event::UrlDeleted(_) => "url_deleted",
            Event::UrlClicked(_) => "url_clicked",
        }
    }
}

/// Payload for `user_registered`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegisteredPayload {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Payload shared by the `url_*` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlEventPayload {
    pub id: i64,
    pub short_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

// =============================================================================
// Email notification (email_notifications queue)
// =============================================================================

/// Email job published bare to `email_notifications`, no envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotification {
    pub to: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

// =============================================================================
// Preview round-trip (preview_jobs / preview_results queues)
// =============================================================================

/// Preview fetch request published by the URL service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewJob {
    pub url_id: i64,
    pub original_url: String,
}

/// Preview fetch result published by the preview worker.
///
/// Correlated with its job by `urlId` only; the two queues are logically
/// paired but carry no message-level request id. A job whose result never
/// arrives leaves the record permanently unfetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub url_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_wire_format() {
        let event = Event::UrlCreated(UrlEventPayload {
            id: 1,
            short_id: "abc123".to_string(),
            original_url: Some("https://example.com".to_string()),
            user_id: None,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"url_created""#));
        assert!(json.contains(r#""payload""#));
        assert!(json.contains(r#""shortId":"abc123""#));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.event_type(), "url_created");
    }

    #[test]
    fn test_event_decodes_camel_case_payload() {
        let json = r#"{"type":"url_created","payload":{"id":1,"shortId":"abc123"}}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::UrlCreated(p) => {
                assert_eq!(p.id, 1);
                assert_eq!(p.short_id, "abc123");
                assert_eq!(p.original_url, None);
            }
            other => panic!("Expected UrlCreated, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_tag_rejected() {
        let json = r#"{"type":"url_archived","payload":{"id":1,"shortId":"abc123"}}"#;
        let result: Result<Event, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_user_registered_tolerates_missing_optionals() {
        let json = r#"{"type":"user_registered","payload":{"id":7}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type(), "user_registered");
    }

    #[test]
    fn test_email_notification_bare_payload() {
        let email = EmailNotification {
            to: "user@example.com".to_string(),
            subject: "Welcome".to_string(),
            body: None,
            template: Some("welcome".to_string()),
        };

        let json = serde_json::to_string(&email).unwrap();
        // No envelope on the email queue
        assert!(!json.contains(r#""type""#));
        assert!(json.contains(r#""to":"user@example.com""#));
    }

    #[test]
    fn test_preview_result_partial_fields() {
        let json = r#"{"urlId":42,"title":"X"}"#;
        let result: PreviewResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.url_id, 42);
        assert_eq!(result.title, Some("X".to_string()));
        assert_eq!(result.description, None);
        assert_eq!(result.image, None);
    }

    #[test]
    fn test_preview_job_round_trips() {
        let job = PreviewJob {
            url_id: 42,
            original_url: "https://x".to_string(),
        };

        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""urlId":42"#));
        assert!(json.contains(r#""originalUrl":"https://x""#));

        let parsed: PreviewJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }
}
