use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server::{build_app, config::ServerConfig, state::AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=debug,job_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        program = %config.worker.program,
        artifact_dir = %config.jobs.artifact_dir.display(),
        "Loaded configuration"
    );

    let state = AppState::new(&config);
    let _sweeper = state.spawn_result_sweeper(config.result_ttl);
    let app = build_app(state, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.expect("failed to bind listen address");
    tracing::info!("Server running on http://{addr}");
    tracing::info!("WebSocket server running on ws://{addr}/ws");

    axum::serve(listener, app).await.expect("server error");
}
