use textlinker_relay::RelayService;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayService,
}

impl AppState {
    pub fn new(relay: RelayService) -> Self {
        Self { relay }
    }
}
