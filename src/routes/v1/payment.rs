use actix_web::{HttpResponse, post, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;

use crate::models::requests::{PaymentCancelRequest, PaymentRequest};
use crate::models::responses::{ApiResponse, Empty};
use crate::{AppState, auth, errors::BookingError};

#[utoipa::path(
    post,
    path = "/api/v1/payment",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<Empty>),
        (status = 400, description = "Payment is no longer pending"),
        (status = 404, description = "No payment for that booking")
    ),
    security(("bearerAuth" = []))
)]
#[post("/payment")]
pub async fn payment(
    state: web::Data<AppState>,
    cred: Option<BearerAuth>,
    body: web::Json<PaymentRequest>,
) -> Result<HttpResponse, BookingError> {
    let user = auth::validate_bearer(state.users.as_ref(), cred).await?;

    let req = body.into_inner();
    req.validate()?;

    state.coordinator.payment(&req, &user.email_user).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("success payment")))
}

#[utoipa::path(
    post,
    path = "/api/v1/payment/cancel",
    request_body = PaymentCancelRequest,
    responses(
        (status = 200, description = "Payment cancelled, stock compensated", body = ApiResponse<Empty>),
        (status = 400, description = "Payment is no longer pending"),
        (status = 404, description = "No payment for that booking")
    ),
    security(("bearerAuth" = []))
)]
#[post("/payment/cancel")]
pub async fn payment_cancel(
    state: web::Data<AppState>,
    cred: Option<BearerAuth>,
    body: web::Json<PaymentCancelRequest>,
) -> Result<HttpResponse, BookingError> {
    let user = auth::validate_bearer(state.users.as_ref(), cred).await?;

    let req = body.into_inner();
    req.validate()?;

    state
        .coordinator
        .payment_cancel(&req, &user.email_user)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("success payment cancel")))
}
