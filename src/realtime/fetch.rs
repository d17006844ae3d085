use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::TransitError;

/// Thin GET wrapper shared by every mode. Every failure comes back as a
/// [`TransitError`]; nothing is retried.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransitError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_owned(),
            timeout,
        })
    }

    async fn get(&self, url: &str, accept: &str) -> Result<reqwest::Response, TransitError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, accept)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                let e = TransitError::from(e);
                warn!(url, error = %e, "Upstream request failed");
                e
            })?;

        Ok(response)
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransitError> {
        let body = self.get(url, "application/x-protobuf, */*").await?.bytes().await?;
        Ok(body.to_vec())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransitError> {
        let body = self.get(url, "application/json").await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransitError::ParseFailure(e.to_string()))
    }
}
