use crate::auth::jwks::KeyStore;
use crate::config::AppConfig;
use crate::token_manager::TokenManager;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub token_manager: TokenManager,
    pub key_store: KeyStore,
    pub management_client: Client,
}

impl AppState {
    /// Client used for all calls to the tenant (token endpoint, key
    /// discovery, user lookups).
    fn create_tenant_client() -> Client {
        Client::builder()
            // Set reasonable timeouts
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(2))
            // Configure connection pool
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            // Build the client
            .build()
            .expect("Failed to create tenant HTTP client")
    }

    pub fn new(config: AppConfig) -> Self {
        let client = Self::create_tenant_client();
        let token_manager = TokenManager::new(client.clone(), config.auth0.clone());
        let key_store = KeyStore::new(client.clone(), config.auth0.jwks_url());
        Self {
            config: Arc::new(config),
            token_manager,
            key_store,
            management_client: client,
        }
    }
}
