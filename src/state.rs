use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    services::password_reset::ResetCodes,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub reset_codes: ResetCodes,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let orm = orm_from_pool(&pool);
        let reset_codes = ResetCodes::new(config.reset_code_ttl);
        Self {
            pool,
            orm,
            config: Arc::new(config),
            reset_codes,
        }
    }
}
