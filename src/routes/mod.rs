pub mod internal;
pub mod v1;

use actix_web::{HttpResponse, get, middleware, web};

use crate::errors::BookingError;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

pub fn config(cfg: &mut web::ServiceConfig) {
    let json_cfg = web::JsonConfig::default()
        .error_handler(|err, _req| BookingError::BadRequest(err.to_string()).into());

    cfg.service(
        web::scope("/api/v1")
            .wrap(middleware::NormalizePath::trim())
            .app_data(json_cfg.clone())
            .configure(v1::config),
    );
    cfg.service(
        web::scope("/api/private")
            .wrap(middleware::NormalizePath::trim())
            .app_data(json_cfg)
            .configure(internal::config),
    );
    cfg.service(health);
}
