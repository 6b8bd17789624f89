//! HTTP transport seam for the acquisition client

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use super::error::AcquireError;

/// Fetches a URL and returns the response body of a successful (2xx) reply
pub trait Transport: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, AcquireError>> + Send;
}

/// Production transport backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(AcquireError::Client)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Bytes, AcquireError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| AcquireError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|source| AcquireError::Request {
                url: url.to_string(),
                source,
            })
    }
}
