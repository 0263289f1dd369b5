use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use spa_voucher_api as api;

use api::notifications::{DeliveryChannel, EmailChannel, WhatsAppChannel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    if cfg.payment_server_key.is_none() {
        warn!("payment server key not configured; webhook will refuse notifications");
    }

    // Delivery channels are optional; missing config disables a channel
    let channel_timeout = Duration::from_secs(cfg.delivery_timeout_secs);
    let email_channel: Option<Arc<dyn DeliveryChannel>> = match (
        cfg.email_api_url.clone(),
        cfg.email_api_key.clone(),
        cfg.email_from.clone(),
    ) {
        (Some(url), Some(key), Some(from)) => {
            Some(Arc::new(EmailChannel::new(url, key, from, channel_timeout)?))
        }
        _ => {
            info!("email delivery not configured; channel disabled");
            None
        }
    };
    let whatsapp_channel: Option<Arc<dyn DeliveryChannel>> =
        match (cfg.whatsapp_api_url.clone(), cfg.whatsapp_api_token.clone()) {
            (Some(url), Some(token)) => {
                Some(Arc::new(WhatsAppChannel::new(url, token, channel_timeout)?))
            }
            _ => {
                info!("whatsapp delivery not configured; channel disabled");
                None
            }
        };

    // Aggregate app services used by HTTP handlers
    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        event_sender.clone(),
        &cfg,
        email_channel,
        whatsapp_channel,
    );

    // Compose shared app state
    let app_state = api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        event_sender,
        services,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        return Err("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into());
    };

    // Build router: root banner + full v1 API + Swagger UI
    let mut app = Router::<api::AppState>::new()
        .route("/", get(|| async { "spa-voucher-api up" }))
        .nest("/api/v1", api::api_v1_routes())
        .merge(api::openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .layer(TimeoutLayer::new(Duration::from_secs(
            cfg.request_timeout_secs,
        )))
        .with_state(app_state);

    // Global in-memory rate limiter
    let rl_cfg = api::rate_limiter::RateLimitConfig {
        requests_per_window: cfg.rate_limit_requests_per_window,
        window_duration: Duration::from_secs(cfg.rate_limit_window_seconds),
        enable_headers: cfg.rate_limit_enable_headers,
        max_tracked_keys: cfg.rate_limit_max_tracked_keys,
    };
    app = app.layer(api::rate_limiter::RateLimitLayer::new(rl_cfg));

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("spa-voucher-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
