//! Standalone deadline-enforcement process.
//!
//! Runs the sweep loop and the notification dispatcher without the HTTP
//! server, for deployments that separate the serving and enforcement
//! roles. The sweeper in the API process and this binary are safe to run
//! side by side: every enforcement write is a conditional UPDATE, so
//! concurrent instances race harmlessly.

use std::sync::Arc;

use plowline_dispatch::{
    DeadlineSweeper, DispatchConfig, ExpirationHandler, HttpPaymentClient, PaymentClient,
};
use plowline_events::{EventBus, NotificationDispatcher, PushDelivery};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plowline_sweeper=debug,plowline_dispatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DispatchConfig::from_env();
    tracing::info!(
        interval_secs = config.sweep_interval_secs,
        "Loaded sweeper configuration"
    );

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = plowline_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    plowline_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection established");

    let payments: Option<Arc<dyn PaymentClient>> = match &config.payment_api_url {
        Some(url) => Some(Arc::new(
            HttpPaymentClient::new(url.clone()).expect("Failed to build payment client"),
        )),
        None => {
            tracing::warn!("PAYMENT_API_URL not set, refunds will stay pending");
            None
        }
    };
    let push = match &config.push_gateway_url {
        Some(url) => Some(PushDelivery::new(url.clone()).expect("Failed to build push client")),
        None => {
            tracing::warn!("PUSH_GATEWAY_URL not set, push delivery disabled");
            None
        }
    };

    let event_bus = Arc::new(EventBus::default());
    let handler = Arc::new(ExpirationHandler::new(
        pool.clone(),
        payments,
        Arc::clone(&event_bus),
        config.enforcement.clone(),
    ));
    let sweeper = DeadlineSweeper::new(
        pool.clone(),
        handler,
        Arc::clone(&event_bus),
        config,
    );

    let dispatcher = tokio::spawn(NotificationDispatcher::run(
        pool,
        event_bus.subscribe(),
        push,
    ));

    let cancel = CancellationToken::new();
    let sweep_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        sweep_cancel.cancel();
    });

    sweeper.run(cancel).await;

    // Close the bus so the dispatcher drains its backlog and exits.
    drop(sweeper);
    drop(event_bus);
    if let Err(e) = dispatcher.await {
        tracing::error!(error = %e, "Notification dispatcher task failed");
    }

    tracing::info!("Sweeper shut down");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping sweeper");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping sweeper");
        }
    }
}
