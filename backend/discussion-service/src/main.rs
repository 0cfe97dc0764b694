use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use discussion_service::handlers;
use discussion_service::middleware::{JwtAuthMiddleware, JwtVerifier};
use discussion_service::store::{PgStore, Stores};
use discussion_service::{AppState, Config};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn health_check(pool: web::Data<sqlx::PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "discussion-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "discussion-service"
        })),
    }
}

/// Discussion Service
///
/// Posts, votes and comments over HTTP.
///
/// # Routes
///
/// - `/api/v1/posts` - ranked feed, post submission and lookup
/// - `/api/v1/posts/{id}/vote` - cast or read the caller's vote
/// - `/api/v1/posts/{id}/comments` - list and add comments
/// - `/api/v1/users/{username}` - profile with posts
/// - `/health`, `/metrics`
#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting discussion-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to create database pool: {}", e),
            )
        })?;
    tracing::info!("Connected to database");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                io::Error::new(io::ErrorKind::Other, format!("Migration failed: {}", e))
            })?;
        tracing::info!("Database migrations applied");
    }

    let stores = Stores::from_backend(Arc::new(PgStore::new(db_pool.clone())));
    let state = web::Data::new(AppState::from_config(&stores, &config));
    let verifier = Arc::new(JwtVerifier::new(
        &config.auth.jwt_secret,
        &config.auth.jwt_audience,
    ));
    let pool_data = web::Data::new(db_pool);

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let allowed_origins = config.cors.allowed_origins.clone();

    HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(pool_data.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(health_check))
            .route(
                "/metrics",
                web::get().to(discussion_service::metrics::serve_metrics),
            )
            .service(
                web::scope("/api/v1")
                    .wrap(JwtAuthMiddleware::new(verifier.clone()))
                    .configure(handlers::configure),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
