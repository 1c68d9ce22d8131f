//! Remote table store reached over REST and the realtime websocket
//!
//! [`RemoteBackend::connect`] returns a [`Backend`] whose tables live on a
//! running invitation server, so the pages work the same in-process and
//! against a deployment.
//!
//! ```rust,ignore
//! let backend = RemoteBackend::connect(&config.client)?;
//! let mut page = GeneratorPage::new(&config.client.site_url);
//! page.mount(backend).await?;
//! ```

use crate::config::ClientConfig;
use crate::core::error::StorageError;
use crate::core::link::parse_base_url;
use crate::core::model::{GuestInvitation, RsvpMessage};
use crate::core::row::{Row, RowChange, Subscription};
use crate::core::service::{Backend, RowService};
use crate::server::exposure::rest::REST_PREFIX;
use crate::server::exposure::rest::auth::API_KEY_HEADER;
use crate::server::exposure::rest::handlers::DeletedResponse;
use crate::server::exposure::rest::params::MAX_LIMIT;
use crate::server::exposure::websocket::REALTIME_PATH;
use crate::server::exposure::websocket::protocol::{
    ClientMessage, ServerMessage, SubscriptionFilter,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const BACKEND: &str = "remote";

/// Builder of [`Backend`]s backed by a remote server
pub struct RemoteBackend;

impl RemoteBackend {
    /// Both tables on the server at `config.backend_url`
    ///
    /// No request is made here; an unreachable server surfaces on the
    /// first operation.
    pub fn connect(config: &ClientConfig) -> Result<Backend> {
        let remote = Arc::new(Remote::new(config)?);
        Ok(Backend::new(
            Arc::new(RemoteRowService::<GuestInvitation>::new(remote.clone())),
            Arc::new(RemoteRowService::<RsvpMessage>::new(remote)),
        ))
    }
}

struct Remote {
    http: reqwest::Client,
    rest_base: String,
    realtime_url: Url,
    api_key: String,
}

impl Remote {
    fn new(config: &ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                message: "an API key is required".to_string(),
            }
            .into());
        }

        let base = parse_base_url(&config.backend_url)?;
        let root = base.as_str().trim_end_matches('/').to_string();

        let mut realtime_url = Url::parse(&format!("{}{}", root, REALTIME_PATH))?;
        let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
        realtime_url
            .set_scheme(scheme)
            .map_err(|_| anyhow!("cannot derive websocket URL from '{}'", root))?;
        realtime_url
            .query_pairs_mut()
            .append_pair(API_KEY_HEADER, &config.api_key);

        Ok(Self {
            http: reqwest::Client::new(),
            rest_base: format!("{}{}", root, REST_PREFIX),
            realtime_url,
            api_key: config.api_key.clone(),
        })
    }

    fn table_url<T: Row>(&self) -> String {
        format!("{}/{}", self.rest_base, T::TABLE)
    }

    async fn send<R: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<R> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;

        let response = reject_on_error(response).await?;
        Ok(response.json::<R>().await?)
    }

    async fn send_empty(&self, request: reqwest::RequestBuilder) -> Result<()> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;

        reject_on_error(response).await?;
        Ok(())
    }
}

/// Turn a non-success response into [`StorageError::Rejected`] carrying the
/// server's `message`
async fn reject_on_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.to_string()
            } else {
                text
            }
        });

    Err(StorageError::Rejected {
        status: status.as_u16(),
        message,
    }
    .into())
}

/// One table of a remote server
pub struct RemoteRowService<T: Row> {
    remote: Arc<Remote>,
    _marker: PhantomData<T>,
}

impl<T: Row> RemoteRowService<T> {
    fn new(remote: Arc<Remote>) -> Self {
        Self {
            remote,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Row> RowService<T> for RemoteRowService<T> {
    async fn select(&self, limit: Option<usize>) -> Result<Vec<T>> {
        let limit = limit.unwrap_or(MAX_LIMIT);
        let request = self
            .remote
            .http
            .get(self.remote.table_url::<T>())
            .query(&[("limit", limit)]);
        self.remote.send(request).await
    }

    async fn insert(&self, draft: T::Draft) -> Result<T> {
        let request = self
            .remote
            .http
            .post(self.remote.table_url::<T>())
            .json(&draft);
        self.remote.send(request).await
    }

    async fn delete(&self, id: T::Id) -> Result<()> {
        let url = format!("{}/{}", self.remote.table_url::<T>(), id);
        self.remote.send_empty(self.remote.http.delete(url)).await
    }

    async fn delete_all_except(&self, sentinel: T::Id) -> Result<u64> {
        let request = self
            .remote
            .http
            .delete(self.remote.table_url::<T>())
            .query(&[("id", format!("neq.{}", sentinel))]);
        let response: DeletedResponse = self.remote.send(request).await?;
        Ok(response.deleted)
    }

    /// Open a websocket and subscribe to this table
    ///
    /// Returns once the server confirmed the subscription, so no change
    /// made afterwards is missed.
    async fn subscribe(&self) -> Result<Subscription<T>> {
        let (ws, _) = connect_async(self.remote.realtime_url.as_str())
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                message: e.to_string(),
            })?;
        let (mut sink, mut stream) = ws.split();

        let subscribe = ClientMessage::Subscribe {
            filter: SubscriptionFilter::table(T::TABLE),
        };
        sink.send(Message::Text(serde_json::to_string(&subscribe)?.into()))
            .await?;

        let subscription_id = loop {
            let frame = stream
                .next()
                .await
                .ok_or_else(|| anyhow!("realtime connection closed before subscribing"))??;
            let Message::Text(text) = frame else {
                continue;
            };
            match serde_json::from_str::<ServerMessage>(&text)? {
                ServerMessage::Subscribed {
                    subscription_id, ..
                } => break subscription_id,
                ServerMessage::Error { message } => {
                    return Err(StorageError::Rejected {
                        status: 400,
                        message,
                    }
                    .into());
                }
                _ => continue,
            }
        };

        tracing::debug!(table = %T::TABLE, subscription = %subscription_id, "realtime subscription open");

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            // Keep the sink alive for the lifetime of the reader
            let _sink = sink;
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(table = %T::TABLE, error = %e, "realtime connection failed");
                        break;
                    }
                };

                let envelope = match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::Event { data, .. }) => data,
                    Ok(ServerMessage::Resync { .. }) => {
                        tracing::warn!(table = %T::TABLE, "realtime server skipped changes");
                        if tx.send(RowChange::Resync).is_err() {
                            break;
                        }
                        continue;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping undecodable realtime message");
                        continue;
                    }
                };

                match RowChange::<T>::from_event(&envelope.event) {
                    Ok(Some(change)) => {
                        if tx.send(change).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(table = %T::TABLE, error = %e, "Dropping undecodable change event");
                    }
                }
            }
        });

        Ok(Subscription::from_stream(UnboundedReceiverStream::new(rx))
            .with_reader(reader.abort_handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend_url: &str) -> ClientConfig {
        ClientConfig {
            backend_url: backend_url.to_string(),
            api_key: "anon-key".to_string(),
            site_url: "https://nikah.example.com".to_string(),
        }
    }

    #[test]
    fn test_urls_from_config() {
        let remote = Remote::new(&config("https://db.example.com/")).unwrap();
        assert_eq!(remote.rest_base, "https://db.example.com/rest/v1");
        assert_eq!(
            remote.table_url::<RsvpMessage>(),
            "https://db.example.com/rest/v1/rsvp_messages"
        );
        assert_eq!(
            remote.realtime_url.as_str(),
            "wss://db.example.com/realtime/v1/websocket?apikey=anon-key"
        );

        let remote = Remote::new(&config("http://127.0.0.1:3000")).unwrap();
        assert_eq!(remote.realtime_url.scheme(), "ws");
    }

    #[test]
    fn test_connect_requires_key_and_url() {
        let mut no_key = config("http://127.0.0.1:3000");
        no_key.api_key.clear();
        assert!(RemoteBackend::connect(&no_key).is_err());

        assert!(RemoteBackend::connect(&config("")).is_err());
    }
}
