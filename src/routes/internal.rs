use actix_web::{HttpResponse, get, web};
use utoipa::IntoParams;

use crate::models::responses::{ApiResponse, PendingPaymentCount};
use crate::{AppState, errors::BookingError};

#[derive(Debug, serde::Deserialize, IntoParams)]
pub struct PendingPaymentQuery {
    /// Ticket detail id to count pending payments for.
    pub ticket_detail: i64,
}

#[utoipa::path(
    get,
    path = "/api/private/payment/pending",
    params(PendingPaymentQuery),
    responses(
        (status = 200, description = "Pending payment count for a detail", body = ApiResponse<PendingPaymentCount>)
    )
)]
#[get("/payment/pending")]
pub async fn count_pending_payment(
    state: web::Data<AppState>,
    query: web::Query<PendingPaymentQuery>,
) -> Result<HttpResponse, BookingError> {
    let resp = state
        .coordinator
        .count_pending_payment(query.ticket_detail)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(resp, "success count pending payment")))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(count_pending_payment);
}
