use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod app_state;
mod availability;
mod booking;
mod config;
mod db;
mod error;
mod gateway;
mod middleware;
mod modules;

use availability::AvailabilityService;
use booking::BookingLifecycle;
use gateway::{
    CalendarGateway, GoogleCalendarGateway, NullCalendarGateway, ResendMailer,
    SlidingWindowLimiter, TurnstileVerifier,
};

/// Booking creation attempts allowed per email address per day.
const EMAIL_RATE_LIMIT: usize = 3;
const EMAIL_RATE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv().ok();

    let env = config::init().context("Failed to load configuration")?.clone();

    let pool = db::init_pool()
        .await
        .context("Failed to initialize database")?;
    let store: Arc<dyn db::BookingStore> = Arc::new(db::PgBookingStore::new(pool));

    let calendar: Arc<dyn CalendarGateway> = match env.google.clone() {
        Some(google) => Arc::new(GoogleCalendarGateway::new(google)),
        None => {
            info!("Google Calendar credentials not configured, using stored settings only");
            Arc::new(NullCalendarGateway)
        }
    };

    let availability = Arc::new(AvailabilityService::new(
        store.clone(),
        calendar.clone(),
        env.booking.owner_timezone,
    ));

    let lifecycle = Arc::new(BookingLifecycle::new(
        store.clone(),
        calendar,
        Arc::new(ResendMailer::new(env.email.clone())),
        Arc::new(TurnstileVerifier::new(env.turnstile.clone())),
        Arc::new(SlidingWindowLimiter::new(EMAIL_RATE_LIMIT, EMAIL_RATE_WINDOW)),
        env.booking.owner_timezone,
        env.booking.public_url.clone(),
    ));

    let addr = env.server_addr();
    let state = app_state::AppState::new(env, store, availability, lifecycle);
    let router = app::create_router(state);

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("Failed to serve application")?;

    Ok(())
}
