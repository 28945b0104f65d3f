//! Phylactery Server - Club Membership and Library Management
//!
//! REST API server for club members, the library and the blog.

use anyhow::Context;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phylactery_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{
        email::{Mailer, SmtpMailer},
        jobs::Scheduler,
        queue::EmailQueue,
        Services,
    },
    AppState,
};

/// Set up console logging, plus daily log files when a directory is configured
fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("phylactery_server={},tower_http=info", config.level).into());

    let json = config.format.eq_ignore_ascii_case("json");
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());
    let pretty_layer = (!json).then(tracing_subscriber::fmt::layer);

    let (file_layer, guard) = match config.directory.as_deref() {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "phylactery.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Phylactery Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let repository = Repository::new(pool);
    let (inserted, deleted) = repository.ranks.sync_rank_table().await?;
    tracing::info!(inserted, deleted, "Rank table synchronised");

    let queue = EmailQueue::new(&config.redis.url, &config.redis.email_queue_key)
        .await
        .context("Failed to connect to Redis")?;

    tracing::info!("Connected to Redis");

    let services = Services::new(repository, &config, queue);

    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(config.email.clone()));
    let _jobs = Scheduler::new(services.clone(), config.jobs.clone(), config.site.clone(), mailer).spawn();

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state)?;

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Anonymous endpoints that send email or check passwords
    let governor = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(4)
            .burst_size(8)
            .finish()
            .context("Invalid rate limit configuration")?,
    );

    let limited = Router::new()
        .route("/account/signup", post(api::accounts::signup))
        .route("/account/activate", post(api::accounts::activate))
        .route("/account/login", post(api::accounts::login))
        .route("/account/password-reset", post(api::accounts::request_password_reset))
        .route(
            "/account/password-reset/confirm",
            post(api::accounts::confirm_password_reset),
        )
        .route(
            "/members/email-preferences/request",
            post(api::members::request_email_preferences),
        )
        .layer(GovernorLayer { config: governor });

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Account
        .route("/account/me", get(api::accounts::me))
        .route("/account/password", post(api::accounts::change_password))
        // Members
        .route("/members", get(api::members::list_members).post(api::members::create_member))
        .route(
            "/members/email-preferences",
            put(api::members::update_email_preferences),
        )
        .route("/members/:id", get(api::members::get_member).put(api::members::update_member))
        .route("/members/:id/memberships", post(api::members::renew_membership))
        .route("/members/:id/borrows", get(api::library::member_borrows))
        // Items
        .route("/items", get(api::items::list_items).post(api::items::create_item))
        .route("/items/random", get(api::items::random_item))
        .route("/items/all", get(api::items::all_items))
        .route("/items/slug/:slug", get(api::items::get_item_by_slug))
        .route("/items/:id", get(api::items::get_item))
        .route("/items/:id", put(api::items::update_item))
        .route("/items/:id", delete(api::items::delete_item))
        .route("/items/:id/tags", put(api::items::set_item_tags))
        // Tags
        .route("/tags", get(api::tags::list_tags))
        .route("/tags/refresh", post(api::tags::refresh_tags))
        .route("/tags/:id/parents", put(api::tags::set_tag_parents))
        // Library
        .route("/library/borrow", post(api::library::borrow))
        .route("/library/return", post(api::library::return_items))
        .route("/library/overdue", get(api::library::overdue))
        .route("/library/borrows/:id/verify", post(api::library::verify_return))
        // External borrowing forms
        .route(
            "/external-forms",
            get(api::external_forms::list_forms).post(api::external_forms::submit_form),
        )
        .route("/external-forms/:id", get(api::external_forms::get_form))
        .route("/external-forms/:id/approve", post(api::external_forms::approve_form))
        .route("/external-forms/:id/deny", post(api::external_forms::deny_form))
        .route("/external-forms/:id/borrowed", post(api::external_forms::mark_borrowed))
        .route("/external-forms/:id/returned", post(api::external_forms::mark_returned))
        // Reservations
        .route(
            "/reservations",
            get(api::reservations::list_reservations).post(api::reservations::submit_reservation),
        )
        .route("/reservations/:id", get(api::reservations::get_reservation))
        .route("/reservations/:id/approve", post(api::reservations::approve_reservation))
        .route("/reservations/:id/deny", post(api::reservations::deny_reservation))
        .route("/reservations/:id/activate", post(api::reservations::activate_reservation))
        .route("/reservations/:id/complete", post(api::reservations::complete_reservation))
        // Blog
        .route("/blog", get(api::blog::list_posts).post(api::blog::create_post))
        .route("/blog/slug/:slug", get(api::blog::get_post_by_slug))
        .route("/blog/:id", get(api::blog::get_post))
        .route("/blog/:id", put(api::blog::update_post))
        .route("/blog/:id", delete(api::blog::delete_post))
        .route(
            "/blog/:id/email-orders",
            get(api::blog::list_email_orders).post(api::blog::create_email_order),
        )
        // Control panel
        .route("/control-panel", get(api::control_panel::list_operations))
        .route("/control-panel/purge-gatekeepers", post(api::control_panel::purge_gatekeepers))
        .route("/control-panel/expire-memberships", post(api::control_panel::expire_memberships))
        .route("/control-panel/committee-transfer", post(api::control_panel::committee_transfer))
        .route("/control-panel/ranks/assign", post(api::control_panel::assign_rank))
        .route("/control-panel/ranks/expire", post(api::control_panel::expire_rank))
        .merge(limited)
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Ok(Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors))
}
