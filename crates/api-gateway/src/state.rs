//! Shared application state handed to every route handler.

use std::sync::Arc;
use storage::Store;

use crate::config::GatewayConfig;
use crate::media::MediaStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<GatewayConfig>,
    /// `None` when media storage is not configured; the upload route then
    /// answers with a generic failure.
    pub media: Option<Arc<MediaStore>>,
}

impl AppState {
    pub fn new(store: Store, config: GatewayConfig, media: Option<MediaStore>) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            media: media.map(Arc::new),
        }
    }
}
