//! Postgres `LISTEN/NOTIFY` change feed
//!
//! Each subscription owns a dedicated backend connection. The connection
//! object is polled directly so notifications arrive in order on the
//! subscriber's task.
use async_trait::async_trait;
use futures::future::poll_fn;
use std::collections::VecDeque;
use tokio_postgres::tls::NoTlsStream;
use tokio_postgres::{AsyncMessage, Client, Connection, NoTls, Socket};

use crate::errors::{HubError, HubResult};
use crate::logger::{self, LogTag};

use super::feed::{ChangeFeed, ChangeSubscription};

type PgConnection = Connection<Socket, NoTlsStream>;

pub struct PostgresFeed {
    url: String,
}

impl PostgresFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ChangeFeed for PostgresFeed {
    async fn subscribe(&self, topic: &str) -> HubResult<Box<dyn ChangeSubscription>> {
        let (client, mut connection) = tokio_postgres::connect(&self.url, NoTls).await?;
        let mut buffered = VecDeque::new();

        // The LISTEN only completes while the connection is being polled
        let listen = listen_statement(topic);
        {
            let command = client.batch_execute(&listen);
            tokio::pin!(command);
            loop {
                tokio::select! {
                    result = &mut command => {
                        result?;
                        break;
                    }
                    message = poll_fn(|cx| connection.poll_message(cx)) => {
                        collect(topic, message, &mut buffered)?;
                    }
                }
            }
        }

        logger::debug(
            LogTag::Listener,
            &format!("Postgres LISTEN active on '{}'", topic),
        );

        Ok(Box::new(PostgresSubscription {
            _client: client,
            connection,
            topic: topic.to_string(),
            buffered,
        }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

struct PostgresSubscription {
    // Dropping the client terminates the backend session
    _client: Client,
    connection: PgConnection,
    topic: String,
    buffered: VecDeque<String>,
}

#[async_trait]
impl ChangeSubscription for PostgresSubscription {
    async fn next_payload(&mut self) -> HubResult<String> {
        loop {
            if let Some(payload) = self.buffered.pop_front() {
                return Ok(payload);
            }
            let connection = &mut self.connection;
            let message = poll_fn(|cx| connection.poll_message(cx)).await;
            collect(&self.topic, message, &mut self.buffered)?;
        }
    }
}

/// Queue a notification payload for `topic`; other async messages are ignored
fn collect(
    topic: &str,
    message: Option<Result<AsyncMessage, tokio_postgres::Error>>,
    buffered: &mut VecDeque<String>,
) -> HubResult<()> {
    match message {
        Some(Ok(AsyncMessage::Notification(notification))) => {
            if notification.channel() == topic {
                buffered.push_back(notification.payload().to_string());
            }
            Ok(())
        }
        Some(Ok(AsyncMessage::Notice(notice))) => {
            logger::debug(
                LogTag::Listener,
                &format!("Postgres notice: {}", notice.message()),
            );
            Ok(())
        }
        Some(Ok(_)) => Ok(()),
        Some(Err(e)) => Err(HubError::Database(e)),
        None => Err(HubError::SubscriptionClosed {
            topic: topic.to_string(),
        }),
    }
}

/// `LISTEN` for a quoted channel name; embedded quotes are doubled
fn listen_statement(topic: &str) -> String {
    format!("LISTEN \"{}\"", topic.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_statement_quotes_topic() {
        assert_eq!(listen_statement("websocket_events"), r#"LISTEN "websocket_events""#);
        assert_eq!(
            listen_statement(r#"evil"; DROP TABLE users; --"#),
            r#"LISTEN "evil""; DROP TABLE users; --""#
        );
    }

    #[test]
    fn test_connection_end_closes_subscription() {
        let mut buffered = VecDeque::new();
        let err = collect("websocket_events", None, &mut buffered).unwrap_err();
        assert!(matches!(err, HubError::SubscriptionClosed { topic } if topic == "websocket_events"));
        assert!(buffered.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_subscribe() {
        let feed = PostgresFeed::new("postgres://nobody@127.0.0.1:1/none?connect_timeout=1");
        assert!(feed.subscribe("websocket_events").await.is_err());
    }
}
