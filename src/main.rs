use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use storefront_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await?;
        info!("Database migrations applied");
    }
    let db = Arc::new(db_pool);

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    let sessions: Arc<dyn api::sessions::SessionStore> =
        Arc::new(api::sessions::InMemorySessionStore::new());

    let gateway: Arc<dyn api::payments::PaymentGateway> = match cfg.stripe_secret_key.clone() {
        Some(key) => Arc::new(api::payments::StripeGateway::new(key)),
        None => {
            warn!("stripe_secret_key not configured; checkout will refuse payments");
            Arc::new(api::payments::UnconfiguredGateway)
        }
    };
    if cfg.stripe_webhook_secret.is_none() {
        warn!("stripe_webhook_secret not configured; webhook deliveries will be rejected");
    }

    let confirmations: Arc<dyn api::notifications::ConfirmationSender> =
        Arc::new(api::notifications::LogConfirmationSender);

    let state = api::build_state(
        db,
        cfg.clone(),
        sessions,
        gateway,
        confirmations,
        event_sender,
        None,
    );

    let cors_layer = match cfg.cors_allowed_origins.as_deref() {
        Some(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .filter_map(|o| {
                    let trimmed = o.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => {
            if cfg.is_development() {
                info!("No CORS origins configured; using permissive CORS for development");
            }
            CorsLayer::permissive()
        }
    };

    let app = api::app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install ctrl-c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
