//! HTTP client for the collection store server.

use crate::{
    config::HttpConfig,
    error::Result,
    remote::{RemoteResult, RemoteStore},
    Error, Payload, RecordId, RemoteError,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`RemoteStore`] talking to the collection store over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpRemoteStore {
    /// Build a client from configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid base url {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "base url cannot hold a path: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Append percent-encoded path segments to the base url.
    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RemoteError::Rejected(format!("base url cannot hold a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn collection_url(&self, collection: &str) -> RemoteResult<Url> {
        self.url(&["collections", collection])
    }

    fn record_url(&self, collection: &str, id: &RecordId) -> RemoteResult<Url> {
        self.url(&["collections", collection, &id.to_string()])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(status_error(status, response).await)
    }
}

async fn status_error(status: StatusCode, response: Response) -> RemoteError {
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    };

    RemoteError::Status {
        status: status.as_u16(),
        message,
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> RemoteResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn insert(&self, collection: &str, data: &Payload) -> RemoteResult<Value> {
        let request = self.client.post(self.collection_url(collection)?).json(data);
        decode(self.send(request).await?).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &RecordId,
        data: &Payload,
    ) -> RemoteResult<Value> {
        let request = self.client.patch(self.record_url(collection, id)?).json(data);
        decode(self.send(request).await?).await
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> RemoteResult<()> {
        let request = self.client.delete(self.record_url(collection, id)?);
        self.send(request).await?;
        Ok(())
    }

    async fn select(&self, collection: &str, filter: &Payload) -> RemoteResult<Vec<Value>> {
        let mut request = self.client.get(self.collection_url(collection)?);
        if !filter.is_empty() {
            let filter = serde_json::to_string(filter)
                .map_err(|e| RemoteError::Rejected(format!("unencodable filter: {e}")))?;
            request = request.query(&[("filter", filter)]);
        }
        decode(self.send(request).await?).await
    }
}
