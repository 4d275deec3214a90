//! Delivery of encoded payloads to the server.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use crate::error::TransportError;

/// Server path for single JSON updates.
pub const UPDATE_PATH: &str = "/update/";
/// Server path for batch updates.
pub const BATCH_PATH: &str = "/updates/";
/// Header carrying a single update's integrity tag.
pub const HASH_HEADER: &str = "Hash";

/// How per-metric reports are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ContentType {
    /// JSON body to `/update/`, tagged when a key is set.
    #[default]
    Json,
    /// Value in the path, `/update/{kind}/{id}/{value}`, empty body.
    Plain,
}

impl ContentType {
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Plain => "text/plain",
        }
    }
}

/// One request's worth of data.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub path: String,
    pub content_type: ContentType,
    pub body: Vec<u8>,
    /// Hex integrity tag sent in the `Hash` header.
    pub tag: Option<String>,
}

impl Delivery {
    /// JSON body posted to `path`.
    pub fn json(path: &str, body: Vec<u8>, tag: Option<String>) -> Self {
        Delivery {
            path: path.to_string(),
            content_type: ContentType::Json,
            body,
            tag,
        }
    }

    /// Path-encoded update with an empty body.
    pub fn plain(kind: &str, id: &str, value: &str) -> Self {
        Delivery {
            path: format!("{}{}/{}/{}", UPDATE_PATH, kind, id, value),
            content_type: ContentType::Plain,
            body: Vec::new(),
            tag: None,
        }
    }
}

/// Delivers a payload and reports whether the server accepted it.
pub trait Transport: Send + Sync + 'static {
    fn deliver(&self, delivery: Delivery) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// HTTP transport over `reqwest`. Every request carries a timeout; only a
/// 2xx response counts as delivered.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(address: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport {
            client,
            base_url: base_url(address),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// `host:port` becomes `http://host:port`; a trailing slash is dropped.
fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

impl Transport for HttpTransport {
    async fn deliver(&self, delivery: Delivery) -> Result<(), TransportError> {
        let mut req = self
            .client
            .post(format!("{}{}", self.base_url, delivery.path))
            .header(CONTENT_TYPE, delivery.content_type.mime())
            .body(delivery.body);
        if let Some(tag) = delivery.tag {
            req = req.header(HASH_HEADER, tag);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
