use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use super::handlers::{auth, health, types};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::refresh_tokens,
        auth::logout,
        auth::validate_token,
    ),
    components(schemas(
        health::Health,
        types::RegisterRequest,
        types::LoginRequest,
        types::AccessTokenRequest,
        types::SessionResponse,
        types::RefreshResponse,
        types::LogoutResponse,
        types::ValidateResponse,
        types::ErrorResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Token issuance, rotation and revocation"),
        (name = "health", description = "Service status"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
