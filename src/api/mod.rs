//! HTTP surface over [`crate::auth::AuthService`].

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{
    apply_schema, Argon2Hasher, AuthService, Fingerprinter, PgSessionStore, PgUserDirectory,
    SystemClock, TokenCodec, TokenConfig,
};

pub mod handlers;
mod openapi;
pub mod state;

pub use openapi::ApiDoc;
pub use state::{AppState, CookieConfig, SameSite};

/// Build the router with every route and middleware layer.
#[must_use]
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh-tokens", post(handlers::auth::refresh_tokens))
        .route("/logout", post(handlers::auth::logout))
        .route("/validate-token", post(handlers::auth::validate_token));

    Router::new()
        .nest("/api/v1", api)
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(Arc::new(state))),
        )
}

/// CORS for browser clients that send the refresh cookie.
#[must_use]
pub fn cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(true)
}

/// Normalize a configured origin to `scheme://host[:port]`.
///
/// # Errors
///
/// Returns an error if the value is not an absolute URL with a host.
pub fn parse_origin(origin: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(origin).with_context(|| format!("Invalid origin: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Origin must include a valid host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    HeaderValue::from_str(&format!("{}://{}{}", parsed.scheme(), host, port))
        .context("Failed to build origin header")
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable, the token config is invalid or
/// the listener cannot bind
pub async fn new(
    port: u16,
    dsn: String,
    token_config: TokenConfig,
    fingerprinter: Fingerprinter,
    cookies: CookieConfig,
    allowed_origins: Vec<HeaderValue>,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let codec = TokenCodec::new(token_config, Arc::new(SystemClock))
        .context("Invalid token configuration")?;

    let auth = AuthService::new(
        Arc::new(PgUserDirectory::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::new(Argon2Hasher),
        codec,
        fingerprinter,
    );

    let state = AppState::new(auth, cookies).with_pool(pool);
    let app = router(state, cors_layer(allowed_origins));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
