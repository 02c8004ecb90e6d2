use std::sync::Arc;

use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;

use crate::notify::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub notifier: Arc<dyn Notifier>,
}
