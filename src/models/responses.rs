use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    pub meta: ResponseMeta,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResponseMeta {
    pub code: u16,
    pub status: String,
    pub message: String,
}

/// A struct with nothing, used where a response carries no data.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Empty {}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            meta: ResponseMeta {
                code: 200,
                status: "OK".to_string(),
                message: message.into(),
            },
            data: Some(data),
        }
    }

    pub fn error(code: u16, status: &str, message: impl Into<String>) -> Self {
        Self {
            meta: ResponseMeta {
                code,
                status: status.to_string(),
                message: message.into(),
            },
            data: None,
        }
    }
}

impl ApiResponse<Empty> {
    /// Success with a message and no data payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(Empty {}, message)
    }
}

/// Answer of the user service's token-validate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserValidate {
    pub is_valid: bool,
    pub user_id: i64,
    #[serde(default)]
    pub email_user: String,
}

/// The caller's latest booking joined with its payment.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookedTicket {
    pub id: String,
    pub full_name: String,
    pub personal_id: String,
    pub booking_date: String,
    pub payment_expiry: String,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PendingPaymentCount {
    pub ticket_detail_id: i64,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data() {
        let resp = ApiResponse::success(
            PendingPaymentCount {
                ticket_detail_id: 7,
                count: 3,
            },
            "success count pending payment",
        );

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["meta"]["code"], 200);
        assert_eq!(json["data"]["count"], 3);
    }

    #[test]
    fn error_envelope_has_no_data_field() {
        let resp = ApiResponse::<Empty>::error(400, "BAD_REQUEST", "stock empty");

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["meta"]["code"], 400);
        assert_eq!(json["meta"]["status"], "BAD_REQUEST");
        assert!(json.get("data").is_none());
    }
}
