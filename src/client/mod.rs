//! Outbound HTTP clients for the user and ticket services. Transient
//! failures are retried with exponential backoff, capped by the configured
//! threshold; non-2xx answers are permanent.

use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_retry2::{Retry, RetryError, strategy::ExponentialBackoff};

pub mod ticket;
pub mod user;

pub use ticket::{HttpTicketClient, TicketClient};
pub use user::{HttpUserClient, UserClient};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0} answered with status {1}")]
    Status(&'static str, u16),
}

pub(crate) fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    threshold: u32,
) -> Result<T, ClientError> {
    let retry_strategy = ExponentialBackoff::from_millis(100).take(threshold as usize);

    let action = async || {
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| RetryError::transient(ClientError::Http(e)))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(RetryError::transient(ClientError::Status(
                service,
                status.as_u16(),
            )));
        }
        if !status.is_success() {
            return Err(RetryError::permanent(ClientError::Status(
                service,
                status.as_u16(),
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| RetryError::permanent(ClientError::Http(e)))
    };

    Retry::spawn(retry_strategy, action).await
}
