use async_trait::async_trait;

use crate::client::{ClientError, get_json};
use crate::config::{HttpClientConfig, ServiceAddr};
use crate::models::responses::UserValidate;

/// Token oracle. The user service owns identity; we only ask whether a
/// bearer token is valid and who it belongs to.
#[async_trait]
pub trait UserClient: Send + Sync {
    async fn validate_token(&self, token: &str) -> Result<UserValidate, ClientError>;
}

pub struct HttpUserClient {
    client: reqwest::Client,
    base_url: String,
    threshold: u32,
}

impl HttpUserClient {
    pub fn new(addr: &ServiceAddr, http: &HttpClientConfig) -> Self {
        Self {
            client: super::build_client(http.timeout),
            base_url: addr.base_url(),
            threshold: http.threshold,
        }
    }
}

#[async_trait]
impl UserClient for HttpUserClient {
    async fn validate_token(&self, token: &str) -> Result<UserValidate, ClientError> {
        let url = format!(
            "{}/api/private/user/validate?token={}",
            self.base_url, token
        );

        get_json(&self.client, "user service", &url, self.threshold).await
    }
}
