use tokio::net::TcpListener;
use todo_server::config::{self, Config};
use todo_server::{build_router, store, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = (!config::is_production()).then(dotenvy::dotenv);
    let config = Config::from_env()?;
    init_tracing(config.log_json);
    match dotenv {
        Some(Ok(path)) => tracing::info!(path = %path.display(), "loaded environment file"),
        Some(Err(err)) => tracing::warn!(error = %err, "no environment file loaded"),
        None => {}
    }

    let store = store::open(&config.store).await?;
    let state = AppState::new(store, config.store_timeout);
    let router = build_router(state, &config)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, production = config.production, "listening");
    todo_server::run(listener, router).await?;
    Ok(())
}
