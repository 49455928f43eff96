use crate::preview::Previewer;

/// Shared application state passed to all handlers.
/// The previewer is built once at startup so every request reuses the same
/// configuration and outbound connection pool.
#[derive(Clone)]
pub struct AppState {
    pub previewer: Previewer,
}
