use toggled_lib::FlagService;

use super::config::StorageBackend;

/// Shared application state for the HTTP server.
///
/// The flag service owns the decision cache; it is created once at startup
/// and dropped with the server.
pub struct AppState {
    pub service: FlagService,
    /// Which backend the service's store runs on.
    pub storage: StorageBackend,
}

impl AppState {
    pub fn new(service: FlagService, storage: StorageBackend) -> Self {
        Self { service, storage }
    }
}
