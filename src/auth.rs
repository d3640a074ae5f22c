//! Bearer auth for the public endpoints. The token is an opaque handle
//! validated against the user service on every request; the caller's
//! identity travels with the request from there on.

use actix_web_httpauth::extractors::bearer::BearerAuth;
use utoipa::openapi::security::{Http, SecurityScheme};

use crate::client::user::UserClient;
use crate::errors::BookingError;

#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user_id: i64,
    pub email_user: String,
}

pub async fn validate_bearer(
    users: &dyn UserClient,
    cred: Option<BearerAuth>,
) -> Result<AuthedUser, BookingError> {
    let Some(cred) = cred else {
        return Err(BookingError::unauthorized("missing bearer token in header"));
    };

    let resp = users.validate_token(cred.token()).await.map_err(|err| {
        tracing::error!("token validation call failed: {err}");
        BookingError::unauthorized("error validate token")
    })?;

    if !resp.is_valid {
        return Err(BookingError::unauthorized("error validate token"));
    }

    Ok(AuthedUser {
        user_id: resp.user_id,
        email_user: resp.email_user,
    })
}

pub struct AuthAddon;

impl utoipa::Modify for AuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(Http::new(utoipa::openapi::security::HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::StaticUserClient;

    #[tokio::test]
    async fn missing_bearer_is_unauthorized() {
        let users = StaticUserClient::valid(42, "a@example.com");

        let err = validate_bearer(&users, None).await.unwrap_err();
        assert!(matches!(err, BookingError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rejected_token_is_reported_invalid() {
        let users = StaticUserClient::invalid();

        let resp = users.validate_token("whatever").await.unwrap();
        assert!(!resp.is_valid);
    }
}
