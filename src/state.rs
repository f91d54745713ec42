use crate::api::ApiClient;
use crate::config::Config;
use crate::session::SessionManager;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub api: ApiClient,
    pub session: SessionManager,
}
