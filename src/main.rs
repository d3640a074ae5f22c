use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use loket::bus::{KafkaBus, consumer::run_intake_consumer};
use loket::cache::RedisStockCache;
use loket::client::{HttpTicketClient, HttpUserClient, TicketClient, UserClient};
use loket::config::Config;
use loket::coordinator::Coordinator;
use loket::database::PgBookingStore;
use loket::errors::BookingError;
use loket::models::requests::PaymentExpiration;
use loket::{AppState, auth::AuthAddon, routes, scheduler};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    let cfg = Config::from_env();

    let pool = PgPool::connect(&cfg.database.url()).await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations completed successfully");

    let tickets: Arc<dyn TicketClient> =
        Arc::new(HttpTicketClient::new(&cfg.ticket_service, &cfg.http_client));
    let users: Arc<dyn UserClient> =
        Arc::new(HttpUserClient::new(&cfg.user_service, &cfg.http_client));

    let cache = Arc::new(RedisStockCache::new(&cfg.redis.url(), tickets.clone()).await?);
    let bus = Arc::new(KafkaBus::new(&cfg.message_stream)?);
    let store = Arc::new(PgBookingStore::new(pool.clone()));

    let (wake_tx, wake_rx) = scheduler::wake_channel();
    let sched = Arc::new(scheduler::PgScheduler::new(pool.clone(), wake_tx));

    let coordinator = Arc::new(Coordinator::new(
        store,
        cache,
        bus.clone(),
        sched,
        tickets,
    ));

    let mut handlers: scheduler::Handlers = HashMap::new();
    let expiry_coordinator = coordinator.clone();
    handlers.insert(
        scheduler::TYPE_SET_PAYMENT_EXPIRED.to_string(),
        Arc::new(move |payload| {
            let coordinator = expiry_coordinator.clone();
            Box::pin(async move {
                let req: PaymentExpiration = serde_json::from_value(payload)
                    .map_err(|err| BookingError::BadRequest(format!("bad expiry payload: {err}")))?;
                coordinator.set_payment_expired(&req).await
            }) as scheduler::TaskFuture
        }),
    );

    tokio::spawn(scheduler::run_worker(
        pool.clone(),
        wake_rx,
        handlers,
        scheduler::DEFAULT_CONCURRENCY,
    ));

    {
        let consumer_cfg = cfg.message_stream.clone();
        let consumer_coordinator = coordinator.clone();
        let consumer_bus = bus.clone();
        tokio::spawn(async move {
            if let Err(err) =
                run_intake_consumer(consumer_cfg, consumer_coordinator, consumer_bus).await
            {
                tracing::error!("intake consumer exited: {err}");
            }
        });
    }

    let state = web::Data::new(AppState { coordinator, users });

    #[derive(OpenApi)]
    #[openapi(
        paths(
            routes::health,
            routes::v1::booking::show_bookings,
            routes::v1::booking::book_ticket,
            routes::v1::payment::payment,
            routes::v1::payment::payment_cancel,
            routes::internal::count_pending_payment,
        ),
        components(schemas(
            loket::models::requests::BookTicketRequest,
            loket::models::requests::PaymentRequest,
            loket::models::requests::PaymentCancelRequest,
            loket::models::responses::BookedTicket,
            loket::models::responses::PendingPaymentCount,
            loket::models::responses::ResponseMeta,
            loket::models::responses::Empty,
            loket::database::PaymentStatus,
        )),
        modifiers(&AuthAddon),
    )]
    struct ApiDocs;

    let http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(["GET", "POST"])
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .wrap(cors)
            .service(web::redirect("/swagger-ui", "/swagger-ui/"))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDocs::openapi()),
            )
            .configure(routes::config)
    })
    .bind(("0.0.0.0", cfg.http.port))?
    .run();

    http_server.await?;

    Ok(())
}
