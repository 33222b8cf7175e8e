use crate::config::auth0::Auth0Config;
use confique::Config;
use url::Url;

pub mod auth0;

/// Main configuration structure for the proxy server
#[derive(Debug, Config, Clone)]
pub struct AppConfig {
    /// The port the server will listen on (default: 8080)
    #[config(env = "PORT", default = 8080)]
    pub port: u16,

    /// Identity provider tenant configuration
    #[config(nested)]
    pub auth0: Auth0Config,
}

impl AppConfig {
    /// Creates a new config instance from environment variables.
    ///
    /// Startup fails here when `AUTH0_DOMAIN` or `AUTH0_AUDIENCE` is not set,
    /// or when the domain does not form a usable URL.
    pub fn new() -> Result<Self, String> {
        let config: Self = Self::builder().env().load().map_err(|e| e.to_string())?;

        Url::parse(&config.auth0.base_url())
            .map_err(|e| format!("AUTH0_DOMAIN {:?} is not usable: {e}", config.auth0.domain))?;

        Ok(config)
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(auth0_mock: &wiremock::MockServer) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            auth0: Auth0Config {
                // The mock URI carries an http:// scheme, which base_url()
                // passes through untouched.
                domain: auth0_mock.uri(),
                audience: format!("{}/api/v2/", auth0_mock.uri()),
                api_audience: "test-api-audience".to_string(),
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                grant_type: "client_credentials".to_string(),
            },
        }
    }
}
