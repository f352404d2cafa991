use tenantplane::{init_tracing, AppConfig, Result, TenantPlane, APP_NAME, VERSION};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    // This must happen before any config is read from environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    init_tracing();

    info!(app_name = APP_NAME, version = VERSION, "Starting tenant isolation core");

    let config = AppConfig::from_env()?;
    info!(
        sweep_interval_seconds = config.rotation.sweep_interval_seconds,
        cache_ttl_seconds = config.cache.ttl_seconds,
        secret_store_enabled = config.secret_store.enabled,
        "Loaded configuration from environment"
    );

    let plane = TenantPlane::bootstrap(config).await?;
    plane.run_until_shutdown().await
}
