use keyloom::AppResources;
use keyloom::api::start_webserver;
use keyloom::bootstrap::BootstrapSequencer;
use keyloom::config::load_config;
use keyloom::store::Repositories;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "keyloom=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    // A missing .env is fine; real environment variables still apply
    let _ = dotenvy::dotenv();

    initialize_tracing();

    let config = Arc::new(load_config()?);
    tracing::info!(
        listen_addr = %config.listen_addr,
        issuer = %config.token.issuer,
        audience = %config.token.audience,
        lifetime_minutes = config.token.lifetime_minutes,
        "configuration loaded"
    );

    let db = Arc::new(Database::connect(config.database_url.as_str()).await?);
    Migrator::up(db.as_ref(), None).await?;
    tracing::info!("Schema migrations applied");

    let resources = AppResources::new(config, Repositories::sea_orm(db))?;

    // Must complete before any traffic is served
    BootstrapSequencer::new(resources.bootstrap_context())
        .run()
        .await?;

    start_webserver(resources).await?;
    Ok(())
}
