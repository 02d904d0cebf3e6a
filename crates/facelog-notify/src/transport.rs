//! Delivery of attendance events to the recording endpoint.

use crate::event::NotificationEvent;
use reqwest::blocking::Client;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Why a send failed. Every failure drops the event; none are retried.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("connection error: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("timeout: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),
}

/// Failure category, for logging and callers that only need the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorKind {
    Connect,
    Timeout,
    Status,
    Request,
}

impl SendError {
    pub fn kind(&self) -> SendErrorKind {
        match self {
            SendError::Connect(_) => SendErrorKind::Connect,
            SendError::Timeout(_) => SendErrorKind::Timeout,
            SendError::Status { .. } => SendErrorKind::Status,
            SendError::Request(_) => SendErrorKind::Request,
        }
    }
}

impl From<reqwest::Error> for SendError {
    fn from(e: reqwest::Error) -> Self {
        // A connect timeout reports both; it is classified as a timeout.
        if e.is_timeout() {
            SendError::Timeout(e)
        } else if e.is_connect() {
            SendError::Connect(e)
        } else {
            SendError::Request(e)
        }
    }
}

/// Something that can deliver an event. Returns `Ok` only on a 2xx response.
pub trait Transport {
    fn send(&self, event: &NotificationEvent) -> Result<(), SendError>;
}

/// JSON POST with `apikey` and bearer authentication headers.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl HttpTransport {
    /// Build the client. Must not be called from inside an async runtime.
    pub fn new(endpoint: Url, api_key: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("facelog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, endpoint, api_key))
    }

    /// Use a preconfigured client (proxy, TLS, timeout settings).
    pub fn with_client(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&self, event: &NotificationEvent) -> Result<(), SendError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(event)
            .send()?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "endpoint accepted event");
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        Err(SendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
