use std::sync::Arc;

use crate::boxes::{BoxBuilder, BoxStore};
use crate::entries::EntryService;
use crate::http::auth::Authenticator;
use crate::http::health::Health;

/// Shared state handed to every handler.
pub struct AppState {
    pub entries: Arc<EntryService>,
    pub boxes: Arc<BoxStore>,
    pub builder: Arc<BoxBuilder>,
    pub auth: Authenticator,
    pub health: Health,
}
