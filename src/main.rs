use fleet_api::config::AppConfig;
use fleet_api::services::tenants::ensure_system_tenant;
use fleet_api::services::users::ensure_admin_user;
use fleet_api::state::AppState;
use fleet_api::{app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_api=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config.database_url).await?;
    db::migrate(&pool).await?;
    ensure_system_tenant(&pool, config.default_heartbeat_s).await?;
    ensure_admin_user(&pool, &config.admin_password).await?;

    let state = AppState::new(pool, config);
    let bind_addr = format!("0.0.0.0:{}", state.config.port);

    let router = app(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "fleet-api listening");

    axum::serve(listener, router).await?;
    Ok(())
}
