//! REST transport for the remote persistence API.
//!
//! - create: `POST {base}/{collection}` with the payload, answered by `{"id": ...}`
//! - update: `PATCH {base}/{collection}/{id}` with the payload
//!
//! Every request carries `Idempotency-Key: <record id>` so a replay after a
//! crash mid-drain cannot create the same entity twice.

use async_trait::async_trait;
use outbox_engine::{Collection, RemoteCollections, RemoteError, RemoteId};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// Header carrying the record id on every remote call.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: serde_json::Value,
}

/// [`RemoteCollections`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: Url,
    token: Option<String>,
    http_client: Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, RemoteError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Self::with_client(base_url, token, http_client)
    }

    pub fn with_client(
        base_url: impl Into<String>,
        token: Option<String>,
        http_client: Client,
    ) -> Result<Self, RemoteError> {
        let raw = base_url.into();
        let base_url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| RemoteError::Transport(format!("invalid base URL '{}': {}", raw, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!("invalid base URL '{}'", raw)));
        }
        Ok(Self {
            base_url,
            token,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `{base}/{collection}`, or `{base}/{collection}/{id}` with the id
    /// percent-encoded as a single path segment.
    fn endpoint(&self, collection: Collection, remote_id: Option<&str>) -> Result<Url, RemoteError> {
        // Dot segments would be dropped and retarget the request
        if let Some(id @ ("." | "..")) = remote_id {
            return Err(RemoteError::Validation(format!(
                "'{}' is not a usable remote id",
                id
            )));
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::Transport(format!("invalid base URL '{}'", self.base_url)))?;
            segments.pop_if_empty().push(collection.name());
            if let Some(id) = remote_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn prepare(&self, request: RequestBuilder, idempotency_key: &str) -> RequestBuilder {
        let request = request.header(IDEMPOTENCY_HEADER, idempotency_key);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, body))
    }
}

/// Map a non-success HTTP status to a [`RemoteError`].
pub fn classify(status: StatusCode, body: String) -> RemoteError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            RemoteError::Validation(message)
        }
        _ => RemoteError::Unexpected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RemoteCollections for HttpRemote {
    async fn create(
        &self,
        collection: Collection,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<RemoteId, RemoteError> {
        let request = self
            .http_client
            .post(self.endpoint(collection, None)?)
            .json(payload);
        let response = self.send(self.prepare(request, idempotency_key)).await?;
        let status = response.status();

        let created: CreatedResponse = response.json().await.map_err(|e| RemoteError::Unexpected {
            status: status.as_u16(),
            message: format!("invalid create response: {}", e),
        })?;

        match created.id {
            serde_json::Value::String(id) if !id.is_empty() => Ok(id),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(RemoteError::Unexpected {
                status: status.as_u16(),
                message: format!("create response carried no usable id: {}", other),
            }),
        }
    }

    async fn update(
        &self,
        collection: Collection,
        remote_id: &str,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(collection, Some(remote_id))?;
        let request = self.http_client.patch(url).json(payload);
        self.send(self.prepare(request, idempotency_key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_statuses() {
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, String::new()),
            RemoteError::Unauthorized("Unauthorized".into())
        );
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, "nope".into()),
            RemoteError::Unauthorized(m) if m == "nope"
        ));
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, "bad qty".into()),
            RemoteError::Validation(_)
        ));
        assert!(matches!(
            classify(StatusCode::CONFLICT, String::new()),
            RemoteError::Validation(_)
        ));
        assert_eq!(
            classify(StatusCode::SERVICE_UNAVAILABLE, "  ".into()),
            RemoteError::Unexpected {
                status: 503,
                message: "Service Unavailable".into()
            }
        );
    }

    #[test]
    fn base_url_is_normalized() {
        let remote = HttpRemote::new("http://localhost:9000/api/", None).unwrap();
        assert_eq!(remote.base_url(), "http://localhost:9000/api");
        assert_eq!(
            remote.endpoint(Collection::InventoryItems, None).unwrap().as_str(),
            "http://localhost:9000/api/inventory_items"
        );

        let root = HttpRemote::new("http://localhost:9000", None).unwrap();
        assert_eq!(
            root.endpoint(Collection::Customers, Some("42")).unwrap().as_str(),
            "http://localhost:9000/customers/42"
        );
    }

    #[test]
    fn remote_ids_stay_one_segment() {
        let remote = HttpRemote::new("http://localhost:9000/api", None).unwrap();
        let url = |id| {
            remote
                .endpoint(Collection::Customers, Some(id))
                .unwrap()
                .to_string()
        };
        assert_eq!(url("acme?x=1"), "http://localhost:9000/api/customers/acme%3Fx=1");
        assert_eq!(url("cus#7"), "http://localhost:9000/api/customers/cus%237");
        assert_eq!(url("a/b"), "http://localhost:9000/api/customers/a%2Fb");
        assert_eq!(url("50%"), "http://localhost:9000/api/customers/50%25");

        for id in [".", ".."] {
            assert!(matches!(
                remote.endpoint(Collection::Customers, Some(id)),
                Err(RemoteError::Validation(_))
            ));
        }
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(matches!(
            HttpRemote::new("not a url", None),
            Err(RemoteError::Transport(_))
        ));
    }
}
