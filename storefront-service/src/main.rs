use service_core::observability::init_tracing;
use storefront_service::{config::Config, services::metrics::init_metrics, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_tracing(
        &config.service_name,
        &config.observability.log_level,
        config.observability.otlp_endpoint.as_deref(),
    );

    // Must be installed before any metric is recorded.
    init_metrics()?;

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
