//! Broker connection management with bounded retry and explicit states.
//!
//! One connection and one channel per service process, shared by every
//! publish and consume call. The initial connection is retried with a fixed
//! backoff a bounded number of times; after exhaustion the service keeps
//! running degraded, where publishes become logged no-ops instead of errors.

use std::sync::Arc;
use std::time::Duration;

use lapin::{
    options::{BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::MessagingError;
use crate::queue::types::ALL_QUEUES;

/// Lifecycle state of the broker connection.
///
/// Degraded mode is the `Disconnected` state after retry exhaustion, not an
/// implicit null channel. Publishes are no-ops in `Disconnected` and
/// `Draining`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Draining,
}

/// Shared broker connection with automatic queue topology setup.
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    url: String,
    retry_interval: Duration,
    max_attempts: u32,
    prefetch_count: u16,
    state: RwLock<ConnectionState>,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl BrokerConnection {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                url: config.amqp_url.clone(),
                retry_interval: Duration::from_millis(config.connect_retry_ms),
                max_attempts: config.connect_max_attempts,
                prefetch_count: config.prefetch_count,
                state: RwLock::new(ConnectionState::Disconnected),
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Establish the connection with bounded fixed-interval retry.
    ///
    /// On success the channel is open, QoS is set, and all queues are declared
    /// durable. On exhaustion the state is `Disconnected` and the caller is
    /// expected to log and continue degraded.
    pub async fn connect(&self) -> Result<Channel, MessagingError> {
        *self.inner.state.write().await = ConnectionState::Connecting;

        let mut attempt = 1u32;
        loop {
            match self.try_connect().await {
                Ok((conn, channel)) => {
                    *self.inner.connection.write().await = Some(conn);
                    *self.inner.channel.write().await = Some(channel.clone());
                    *self.inner.state.write().await = ConnectionState::Connected;

                    info!(attempt = attempt, "rabbitmq_connected");
                    return Ok(channel);
                }
                Err(e) if attempt >= self.inner.max_attempts => {
                    *self.inner.state.write().await = ConnectionState::Disconnected;

                    error!(
                        attempts = attempt,
                        error = %e,
                        "rabbitmq_connect_exhausted"
                    );
                    return Err(MessagingError::ConnectExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt = attempt,
                        retry_ms = self.inner.retry_interval.as_millis() as u64,
                        error = %e,
                        "rabbitmq_connect_retry"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.inner.retry_interval).await;
                }
            }
        }
    }

    async fn try_connect(&self) -> Result<(Connection, Channel), lapin::Error> {
        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default()).await?;
        let channel = conn.create_channel().await?;

        channel
            .basic_qos(self.inner.prefetch_count, BasicQosOptions::default())
            .await?;

        for queue in ALL_QUEUES {
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
        }

        info!(
            prefetch_count = self.inner.prefetch_count,
            queues = ALL_QUEUES.len(),
            "rabbitmq_topology_declared"
        );

        Ok((conn, channel))
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// The shared channel, only while `Connected` and the channel is live.
    pub async fn channel(&self) -> Option<Channel> {
        if *self.inner.state.read().await != ConnectionState::Connected {
            return None;
        }
        let channel = self.inner.channel.read().await;
        channel.as_ref().filter(|ch| ch.status().connected()).cloned()
    }

    /// Tear down: channel first, then connection, each best-effort.
    ///
    /// Errors are logged and swallowed, never retried. No publish or consume
    /// may be issued concurrently with teardown.
    pub async fn close(&self) {
        *self.inner.state.write().await = ConnectionState::Draining;

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        *self.inner.state.write().await = ConnectionState::Disconnected;
        info!("rabbitmq_connection_closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::from_env();
        config.amqp_url = "amqp://localhost:5672".to_string();
        config
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let connection = BrokerConnection::new(&test_config());
        assert_eq!(connection.state().await, ConnectionState::Disconnected);
        assert!(connection.channel().await.is_none());
    }

    #[tokio::test]
    async fn test_close_without_connect_is_harmless() {
        let connection = BrokerConnection::new(&test_config());
        connection.close().await;
        assert_eq!(connection.state().await, ConnectionState::Disconnected);
        assert!(connection.channel().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_retry_exhaustion_goes_degraded() {
        let mut config = test_config();
        // Nothing listens on port 1; every attempt is refused immediately
        config.amqp_url = "amqp://127.0.0.1:1".to_string();
        config.connect_retry_ms = 10;
        config.connect_max_attempts = 2;

        let connection = BrokerConnection::new(&config);
        let err = connection.connect().await.expect_err("connect should exhaust");

        match err {
            MessagingError::ConnectExhausted { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("Expected ConnectExhausted, got {other:?}"),
        }

        // Degraded mode: explicit state, no channel, publishes become no-ops
        assert_eq!(connection.state().await, ConnectionState::Disconnected);
        assert!(connection.channel().await.is_none());
    }
}
