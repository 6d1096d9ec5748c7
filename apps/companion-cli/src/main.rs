mod app;
mod config;
mod console;

use tracing_subscriber::EnvFilter;

use config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,companion=debug")),
        )
        .init();

    let settings = Settings::load()?;
    tracing::info!(
        endpoint = %settings.endpoint,
        account = %settings.account,
        version = env!("CARGO_PKG_VERSION"),
        "starting companion"
    );
    app::run(settings).await
}
