use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::Catalog;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub catalog: Arc<Catalog>,
}
