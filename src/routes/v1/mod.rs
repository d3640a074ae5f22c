pub mod booking;
pub mod payment;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(booking::show_bookings)
        .service(booking::book_ticket)
        .service(payment::payment)
        .service(payment::payment_cancel);
}
