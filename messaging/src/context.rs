//! Correlation context for cross-service log correlation.
//!
//! Every inbound unit of work (queue delivery, HTTP request in a collaborating
//! service) gets one context carrying a correlation id and the name of the
//! service handling it. The context is scoped to the task handling that unit
//! of work via task-local storage, so concurrently handled deliveries never
//! observe each other's context.

use uuid::Uuid;

/// Per-unit-of-work correlation context.
///
/// Created once at the start of handling a delivery, never mutated afterwards,
/// never persisted. `source_service` is the name of the service that published
/// the message, recovered from the `x-source-service` header when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    /// Opaque id associating all log entries of one logical operation
    pub correlation_id: String,
    /// Name of the service currently handling the unit of work
    pub service_name: String,
    /// Name of the service that originated the message, if known
    pub source_service: Option<String>,
}

impl CorrelationContext {
    pub fn new(
        correlation_id: impl Into<String>,
        service_name: impl Into<String>,
        source_service: Option<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            service_name: service_name.into(),
            source_service,
        }
    }
}

tokio::task_local! {
    static CURRENT_CONTEXT: CorrelationContext;
}

/// Run a future with `context` active for its entire dynamic extent.
///
/// Code inside the future, including awaited sub-futures, observes the context
/// via [`current`]. Code outside observes none. Tasks spawned from inside do
/// not inherit the context; per-delivery handling enters its own scope.
pub async fn run_with_context<F>(context: CorrelationContext, fut: F) -> F::Output
where
    F: std::future::Future,
{
    CURRENT_CONTEXT.scope(context, fut).await
}

/// The context of the current unit of work, if one is active.
pub fn current() -> Option<CorrelationContext> {
    CURRENT_CONTEXT.try_with(|ctx| ctx.clone()).ok()
}

/// Generate a fresh correlation id for a unit of work that arrived without one.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_correlation_id_unique_and_non_empty() {
        let a = generate_correlation_id();
        let b = generate_correlation_id();
        assert!(!a.is_empty());
        assert!(!b.is_empty());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_current_is_none_outside_scope() {
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_current_observes_scoped_context() {
        let ctx = CorrelationContext::new("abc", "url-service", Some("api-gateway".to_string()));

        let observed = run_with_context(ctx.clone(), async {
            // Still visible after a suspension point
            tokio::task::yield_now().await;
            current()
        })
        .await;

        assert_eq!(observed, Some(ctx));
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let task = |id: &'static str| {
            tokio::spawn(run_with_context(
                CorrelationContext::new(id, "worker", None),
                async move {
                    for _ in 0..10 {
                        tokio::task::yield_now().await;
                        let ctx = current().expect("context lost inside scope");
                        assert_eq!(ctx.correlation_id, id);
                    }
                },
            ))
        };

        let (a, b) = tokio::join!(task("ctx-a"), task("ctx-b"));
        a.unwrap();
        b.unwrap();
    }
}
