use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jackie_backend::{
    api,
    utils::Config,
    workers::{start_profile_update_worker, start_session_sweeper},
    AppState, NAME, VERSION,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Chargement de la configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Impossible de charger la configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialisation du logging
    setup_tracing(&config.log_level, &config.log_format);
    info!("🚀 Démarrage de {} v{}", NAME, VERSION);
    info!("🔧 Mode: {}", config.run_mode);

    let host = config.server_host.clone();
    let port = config.server_port;
    let workers = config.workers;
    let sweep_interval = Duration::from_secs(config.session_sweep_interval_seconds);
    let poll_interval = Duration::from_secs(config.update_poll_interval_seconds);

    // Initialisation des services
    let state = match AppState::from_config(config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            error!("❌ Impossible d'initialiser les services: {}", e);
            std::process::exit(1);
        }
    };

    // Démarrage des workers background
    start_session_sweeper(state.sessions.clone(), sweep_interval);
    start_profile_update_worker(state.queue.clone(), state.updater.clone(), poll_interval);

    // Configuration du serveur Actix-Web
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(api::config)
    })
    .bind((host.as_str(), port))?
    .workers(workers)
    .shutdown_timeout(10);

    info!("✅ Backend démarré avec succès!");
    info!("🔗 API disponible sur http://{}:{}", host, port);

    server.run().await
}

/// Configure le tracing pour le logging structuré
fn setup_tracing(log_level: &str, log_format: &str) {
    let log_level = log_level.parse().unwrap_or(tracing::Level::INFO);

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_level.into()),
        )
        .with(if log_format == "json" {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(true),
            ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
        } else {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_line_number(true)
                    .with_file(true),
            ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
        });

    subscriber.init();
}
