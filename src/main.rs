use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_catalog::api::router;
use course_catalog::config::AppConfig;
use course_catalog::db;
use course_catalog::services::{Catalog, CatalogScheduler};
use course_catalog::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "course_catalog=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config.database_url, config.max_connections).await?;
    db::migrate(&pool).await?;

    let catalog = Arc::new(Catalog::new(pool.clone(), config.catalog_settings()));

    if config.refresh_interval_secs > 0 {
        let scheduler = CatalogScheduler::new(catalog.clone(), config.refresh_interval_secs);
        tokio::spawn(scheduler.start());
    } else {
        info!("catalog refresh scheduler disabled");
    }

    let state = AppState { db: pool, catalog };
    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
