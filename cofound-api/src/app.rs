/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use cofound_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::from_config(pool, config)?;
/// let app = cofound_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use cofound_shared::auth::middleware::create_jwt_middleware;
use cofound_shared::email::{EmailError, EmailSender, HttpEmailConfig, HttpEmailSender, LogEmailSender};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Shared application state
///
/// Cloned into every handler through Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Outbound email boundary
    pub email: Arc<dyn EmailSender>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, email: Arc<dyn EmailSender>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            email,
        }
    }

    /// Picks the email sender from configuration
    ///
    /// Without an email API key, sign-in links are written to the log.
    pub fn from_config(db: PgPool, config: Config) -> Result<Self, EmailError> {
        let email: Arc<dyn EmailSender> = match &config.email.api_key {
            Some(api_key) => Arc::new(HttpEmailSender::new(HttpEmailConfig {
                api_url: config.email.api_url.clone(),
                api_key: api_key.clone(),
                from: config.email.from.clone(),
            })?),
            None => {
                info!("EMAIL_API_KEY not set, sign-in links will be logged");
                Arc::new(LogEmailSender)
            }
        };

        Ok(Self::new(db, config, email))
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Builds the complete Axum router
///
/// ```text
/// /health                                             GET
/// /api/auth/magic-link                                POST
/// /api/auth/magic-link/verify                         GET
/// /api/auth/refresh                                   POST
/// /api/tags                                           GET
/// /api/startups                                       GET, POST*
/// /api/startups/:id                                   GET, PATCH*
/// /api/startups/:id/participation                     GET*
/// /api/startups/:id/requests                          POST*
/// /api/startups/:id/requests/:request_id/accept       POST*
/// /api/startups/:id/requests/:request_id/reject       POST*
/// /api/requests                                       GET*
/// /api/users/me                                       GET*, PATCH*
/// /api/users/me/tags                                  PUT*
/// /api/users/:id                                      GET
/// /api/users/by-username/:username                    GET
/// ```
///
/// `*` requires a session. The session middleware runs on every `/api`
/// route; handlers marked `*` take `AuthContext`, which rejects anonymous
/// requests.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/magic-link", post(routes::auth::request_magic_link))
        .route("/magic-link/verify", get(routes::auth::verify_magic_link))
        .route("/refresh", post(routes::auth::refresh));

    let startup_routes = Router::new()
        .route(
            "/",
            get(routes::startups::list_startups).post(routes::startups::create_startup),
        )
        .route(
            "/:id",
            get(routes::startups::get_startup).patch(routes::startups::update_startup),
        )
        .route("/:id/participation", get(routes::startups::participation_state))
        .route("/:id/requests", post(routes::requests::create_request))
        .route(
            "/:id/requests/:request_id/accept",
            post(routes::requests::accept_request),
        )
        .route(
            "/:id/requests/:request_id/reject",
            post(routes::requests::reject_request),
        );

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_me).patch(routes::users::update_me),
        )
        .route("/me/tags", put(routes::users::replace_my_tags))
        .route("/by-username/:username", get(routes::users::get_by_username))
        .route("/:id", get(routes::users::get_user));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/startups", startup_routes)
        .nest("/users", user_routes)
        .route("/requests", get(routes::requests::list_requests))
        .route("/tags", get(routes::tags::search_tags))
        .layer(axum::middleware::from_fn(create_jwt_middleware(
            state.jwt_secret().to_string(),
        )));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    async fn preflight(config: &Config, origin: &str) -> Option<String> {
        let app: Router = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(config));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/ping")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_cors_allows_only_configured_origins() {
        let mut config = Config::for_tests("postgresql://localhost/cofound");
        config.api.cors_origins = vec!["https://cofound.dev".to_string()];

        assert_eq!(
            preflight(&config, "https://cofound.dev").await.as_deref(),
            Some("https://cofound.dev")
        );
        assert_eq!(preflight(&config, "https://evil.example").await, None);
    }

    #[tokio::test]
    async fn test_cors_wildcard_is_permissive() {
        let mut config = Config::for_tests("postgresql://localhost/cofound");
        config.api.cors_origins = vec!["*".to_string()];

        assert_eq!(
            preflight(&config, "https://anywhere.example").await.as_deref(),
            Some("*")
        );
    }
}
