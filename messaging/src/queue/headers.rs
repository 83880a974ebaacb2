//! Correlation header injection and extraction.
//!
//! Correlation travels as transport headers, never in the body:
//! `x-correlation-id` and `x-source-service`, both optional strings. A message
//! without them is an expected case, not an error.

use lapin::types::{AMQPValue, FieldTable};

use crate::context::{self, CorrelationContext};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const SOURCE_SERVICE_HEADER: &str = "x-source-service";

/// Headers for an outgoing message, taken from the active context.
///
/// Without an active context the table stays empty and the message goes out
/// uncorrelated.
pub(crate) fn correlation_headers() -> FieldTable {
    let mut headers = FieldTable::default();
    if let Some(ctx) = context::current() {
        inject_context(&mut headers, &ctx);
    }
    headers
}

/// Write the context's correlation id and service name into `headers`.
pub(crate) fn inject_context(headers: &mut FieldTable, context: &CorrelationContext) {
    headers.insert(
        CORRELATION_ID_HEADER.into(),
        AMQPValue::LongString(context.correlation_id.as_str().into()),
    );
    headers.insert(
        SOURCE_SERVICE_HEADER.into(),
        AMQPValue::LongString(context.service_name.as_str().into()),
    );
}

/// Recover (correlation id, source service) from an incoming message's headers.
pub(crate) fn extract_context(headers: Option<&FieldTable>) -> (Option<String>, Option<String>) {
    (
        header_string(headers, CORRELATION_ID_HEADER),
        header_string(headers, SOURCE_SERVICE_HEADER),
    )
}

fn header_string(headers: Option<&FieldTable>, key: &str) -> Option<String> {
    let table = headers?;
    table
        .inner()
        .iter()
        .find(|(k, _)| k.as_str() == key)
        .and_then(|(_, v)| match v {
            AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
            AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_then_extract_round_trips() {
        let ctx = CorrelationContext::new("abc", "url-service", None);
        let mut headers = FieldTable::default();
        inject_context(&mut headers, &ctx);

        let (correlation_id, source_service) = extract_context(Some(&headers));
        assert_eq!(correlation_id, Some("abc".to_string()));
        assert_eq!(source_service, Some("url-service".to_string()));
    }

    #[test]
    fn test_extract_missing_headers() {
        let (correlation_id, source_service) = extract_context(None);
        assert_eq!(correlation_id, None);
        assert_eq!(source_service, None);
    }

    #[test]
    fn test_extract_empty_table() {
        let headers = FieldTable::default();
        let (correlation_id, source_service) = extract_context(Some(&headers));
        assert_eq!(correlation_id, None);
        assert_eq!(source_service, None);
    }

    #[test]
    fn test_extract_ignores_empty_values() {
        let mut headers = FieldTable::default();
        headers.insert(
            CORRELATION_ID_HEADER.into(),
            AMQPValue::LongString("".into()),
        );

        let (correlation_id, _) = extract_context(Some(&headers));
        assert_eq!(correlation_id, None);
    }

    #[test]
    fn test_correlation_headers_empty_without_context() {
        let headers = correlation_headers();
        let (correlation_id, source_service) = extract_context(Some(&headers));
        assert_eq!(correlation_id, None);
        assert_eq!(source_service, None);
    }
}
