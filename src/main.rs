use std::sync::{Arc, Mutex, RwLock};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use barberbook::config::{AppConfig, Settings};
use barberbook::db;
use barberbook::handlers;
use barberbook::services::clock::SystemClock;
use barberbook::services::messaging::twilio::TwilioSmsProvider;
use barberbook::services::reminders;
use barberbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "barberbook=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(!config.admin_token.is_empty(), "ADMIN_TOKEN must be set");

    let conn = db::init_db(&config.database_url)?;
    let settings = Settings::load(&conn, &config)?;
    tracing::info!(shop = %settings.shop_name, "settings loaded");

    let messaging = TwilioSmsProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    )?;
    if !messaging.is_configured() {
        tracing::warn!("twilio credentials missing, outbound SMS will be logged as failed");
    }

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        settings: RwLock::new(settings),
        messaging: Box::new(messaging),
        clock: Box::new(SystemClock),
    });

    reminders::spawn_reminder_loop(Arc::clone(&state), config.reminder_interval_secs);

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/barbers", get(handlers::booking::list_barbers))
        .route(
            "/api/barbers/:id/availability",
            get(handlers::booking::get_availability),
        )
        .route("/api/bookings", post(handlers::booking::create_booking))
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::booking::cancel_booking),
        )
        .route("/calendar/:appointment_id", get(handlers::calendar::download_ics))
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments).post(handlers::admin::create_appointment),
        )
        .route(
            "/api/admin/appointments/:id/approve",
            post(handlers::admin::approve_appointment),
        )
        .route(
            "/api/admin/appointments/:id/reject",
            post(handlers::admin::reject_appointment),
        )
        .route(
            "/api/admin/appointments/:id/cancel",
            post(handlers::admin::cancel_appointment),
        )
        .route("/api/admin/barbers", post(handlers::admin::create_barber))
        .route(
            "/api/admin/barbers/:id/working-hours",
            get(handlers::admin::get_working_hours).put(handlers::admin::put_working_hours),
        )
        .route("/api/admin/reminders/run", post(handlers::admin::run_reminders))
        .route("/api/admin/jobs", get(handlers::admin::get_job_logs))
        .route("/api/admin/sms-logs", get(handlers::admin::get_sms_logs))
        .route(
            "/api/admin/settings",
            get(handlers::admin::get_settings).post(handlers::admin::update_settings),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
