use actix_web::{HttpResponse, get, post, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;

use crate::models::requests::BookTicketRequest;
use crate::models::responses::{ApiResponse, BookedTicket, Empty};
use crate::{AppState, auth, errors::BookingError};

#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    responses(
        (status = 200, description = "Latest booking with its payment", body = ApiResponse<BookedTicket>),
        (status = 404, description = "User has no booking")
    ),
    security(("bearerAuth" = []))
)]
#[get("/bookings")]
pub async fn show_bookings(
    state: web::Data<AppState>,
    cred: Option<BearerAuth>,
) -> Result<HttpResponse, BookingError> {
    let user = auth::validate_bearer(state.users.as_ref(), cred).await?;

    let booked = state.coordinator.show_bookings(user.user_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(booked, "success show bookings")))
}

#[utoipa::path(
    post,
    path = "/api/v1/book",
    request_body = BookTicketRequest,
    responses(
        (status = 200, description = "Booking accepted to the intake queue", body = ApiResponse<Empty>),
        (status = 400, description = "Sold out, over quota or malformed request")
    ),
    security(("bearerAuth" = []))
)]
#[post("/book")]
pub async fn book_ticket(
    state: web::Data<AppState>,
    cred: Option<BearerAuth>,
    body: web::Json<BookTicketRequest>,
) -> Result<HttpResponse, BookingError> {
    let user = auth::validate_bearer(state.users.as_ref(), cred).await?;

    let req = body.into_inner();
    req.validate()?;

    state
        .coordinator
        .book_ticket(&req, user.user_id, &user.email_user)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message(
        "success book ticket, please check your email for payment ticket",
    )))
}
