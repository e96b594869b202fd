//! OpenAPI/Utoipa configuration.

use crate::api::{health::MISC_TAG, token::TOKEN_TAG, users::USERS_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let bearer = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .bearer_format("JWT")
            .description(Some(
                "Use the `access_token` obtained from `POST /token` with the password grant.",
            ))
            .build();
        components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Keyloom API",
        version = "0.1.0",
        description = "Identity provider issuing and validating signed access tokens."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = TOKEN_TAG, description = "Token issuance and validation"),
        (name = USERS_TAG, description = "User management")
    )
)]
pub struct ApiDoc;
