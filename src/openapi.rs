use utoipa::OpenApi;

pub(crate) const META_TAG: &str = "Meta API";
pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const USERS_TAG: &str = "Users API";

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = META_TAG, description = "Service status and release redirects"),
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = USERS_TAG, description = "Proxied management API lookups"),
    ),
    info(
        title = "User Data Proxy API",
        description = "Bearer-token gated proxy for identity provider user lookups",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
