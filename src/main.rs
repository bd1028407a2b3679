use flag_evaluation_service::{catalog::FlagCatalog, config, routes, state, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    telemetry::init_tracing(config.log_format);

    let catalog = FlagCatalog::load(&config.flags_path).await?;

    let state = state::AppState::new(catalog);

    let app = routes::routes().with_state(state);

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;

    tracing::info!(addr = %config.addr(), "server is chilling");

    axum::serve(listener, app).await?;
    Ok(())
}
