// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::http::HeaderName;
use server::config::AppConfig;
use server::dispatcher::{self, TracingAlertSurface};
use server::mailer::{Mailer, SmtpMailer};
use server::state::AppState;
use server::{database, routes};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting up the server...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:?}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match database::establish_connection_pool(&config.database_url).await {
        Ok(pool) => {
            tracing::info!("Database connection was made successfully.");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect with the database: {:?}", e);
            std::process::exit(1);
        }
    };

    let mailer: Option<Arc<dyn Mailer>> = match &config.smtp {
        Some(smtp) => match SmtpMailer::from_config(smtp) {
            Ok(mailer) => Some(Arc::new(mailer)),
            Err(e) => {
                tracing::error!("Failed to set up the SMTP transport: {:?}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("SMTP is not configured; streak and reminder emails are disabled.");
            None
        }
    };

    // `config` moves into the shared state below; keep what `main` still
    // needs before it goes.
    let bind_addr = config.bind_addr;
    let alert_profile_id = config.alert_profile_id;
    let alert_poll_secs = config.alert_poll_secs;

    let state = AppState::new(db_pool.clone(), mailer, config);

    // Local notification loop for the profile named by ALERT_PROFILE_ID.
    let dispatcher_handle = alert_profile_id.and_then(|profile_id| {
        dispatcher::spawn(
            db_pool,
            Arc::new(TracingAlertSurface),
            profile_id,
            alert_poll_secs,
        )
    });

    let app_routes = routes::create_router(state);

    let cors = CorsLayer::new()
        .allow_methods(Any) // Autorise toutes les méthodes HTTP
        // Liste explicite des en-têtes que le frontend peut envoyer.
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-scheduler-token"),
        ])
        .allow_origin(Any); // Autorise toutes les origines

    let app = app_routes.layer(cors).layer(TraceLayer::new_for_http());

    tracing::info!("The server listens on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    if let Some(handle) = dispatcher_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped.");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for the shutdown signal: {:?}", e);
    }
}
