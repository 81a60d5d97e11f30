/// Middleware modules for the API server
///
/// Session authentication lives in `cofound_shared::auth::middleware`.

pub mod security;
