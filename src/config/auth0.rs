use confique::Config;

/// Configuration for the identity provider tenant
#[derive(Debug, Config, Clone)]
pub struct Auth0Config {
    /// Tenant domain, e.g. "example.eu.auth0.com". Required. A value carrying
    /// an explicit scheme is used as-is, which lets local setups point at a
    /// plain-http server.
    #[config(env = "AUTH0_DOMAIN")]
    pub domain: String,

    /// Audience of the management API the proxy obtains its own token for.
    /// Required.
    #[config(env = "AUTH0_AUDIENCE")]
    pub audience: String,

    /// Audience expected in inbound bearer tokens (default: "")
    #[config(env = "API_AUDIENCE", default = "")]
    pub api_audience: String,

    /// Client id of the machine-to-machine application (default: "")
    #[config(env = "CLIENT_ID", default = "")]
    pub client_id: String,

    /// Client secret of the machine-to-machine application (default: "")
    #[config(env = "CLIENT_SECRET", default = "")]
    pub client_secret: String,

    /// OAuth grant type used for the credential fetch
    /// (default: client_credentials)
    #[config(env = "GRANT_TYPE", default = "client_credentials")]
    pub grant_type: String,
}

impl Auth0Config {
    /// Base URL of the tenant. A bare domain becomes `https://{domain}`.
    pub fn base_url(&self) -> String {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            self.domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.domain)
        }
    }

    /// Expected `iss` claim of inbound tokens.
    pub fn issuer(&self) -> String {
        format!("{}/", self.base_url())
    }

    /// OAuth token endpoint used to fetch the machine-to-machine credential.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url())
    }

    /// The tenant's published signing key set.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.base_url())
    }

    /// Management API user lookup endpoint.
    pub fn user_url(&self, id: &str) -> String {
        format!("{}/api/v2/users/{}", self.base_url(), id)
    }
}
