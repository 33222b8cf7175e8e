use crate::config::AppConfig;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::LevelFilter;
use rsa::pkcs8::EncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

/// Key id the fixture publishes in its key set.
pub const TEST_KID: &str = "test-signing-key";

/// RSA key pair shared by all tests; generating a fresh 2048-bit key per
/// fixture would dominate the test runtime.
fn test_private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = rand::rngs::OsRng;
        RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate test RSA key")
    })
}

/// Signs bearer tokens the way the tenant would
pub struct TestKeys {
    encoding_key: EncodingKey,
    jwks: Value,
}

impl TestKeys {
    fn new() -> Self {
        let private_key = test_private_key();
        let pem = private_key
            .to_pkcs8_pem(Default::default())
            .expect("Failed to encode test key as PEM");
        let encoding_key =
            EncodingKey::from_rsa_pem(pem.as_bytes()).expect("Failed to build encoding key");

        let public_key = private_key.to_public_key();
        let jwks = json!({
            "keys": [{
                "kty": "RSA",
                "kid": TEST_KID,
                "use": "sig",
                "alg": "RS256",
                "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
                "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
            }]
        });

        Self { encoding_key, jwks }
    }

    /// Sign claims under the key id published in the fixture's key set.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(claims, TEST_KID)
    }

    /// Sign claims under an arbitrary key id.
    pub fn sign_with_kid(&self, claims: &Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &self.encoding_key).expect("Failed to sign test token")
    }

    /// Sign claims with no key id in the token header.
    pub fn sign_without_kid(&self, claims: &Value) -> String {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .expect("Failed to sign test token")
    }
}

/// Test fixture wiring the full router to a mocked tenant.
///
/// One wiremock server stands in for the identity provider: the token
/// endpoint, the key discovery endpoint, and the management API all live on
/// it. Nothing is mounted by default; each test mounts what it needs.
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Application state backing the router
    pub state: AppState,
    /// Mock server standing in for the tenant
    pub auth0_mock: MockServer,
    /// Token signer matching the fixture's published key set
    pub keys: TestKeys,
}

impl TestFixture {
    pub async fn new() -> Self {
        // Initialize test logger
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let auth0_mock = MockServer::start().await;
        let config = AppConfig::for_test_with_mocks(&auth0_mock);
        let state = AppState::new(config);
        let app = create_app(state.clone()).await;

        Self {
            app,
            state,
            auth0_mock,
            keys: TestKeys::new(),
        }
    }

    /// Claims of a well-formed, correctly scoped token for this fixture's
    /// tenant. Tests mutate individual fields to produce invalid variants.
    pub fn default_claims(&self) -> Value {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_secs();
        json!({
            "iss": format!("{}/", self.auth0_mock.uri()),
            "sub": "auth0-test-user",
            "aud": "test-api-audience",
            "iat": now,
            "exp": now + 3600,
            "scope": "openid read:userdata",
        })
    }

    /// Serve the fixture's key set on the discovery endpoint.
    pub async fn mount_jwks(&self) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.keys.jwks.clone()))
            .mount(&self.auth0_mock)
            .await;
    }

    /// Serve a successful credential on the token endpoint.
    pub async fn mount_token_endpoint(&self, access_token: &str, expires_in: u64) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "expires_in": expires_in,
                "token_type": "Bearer",
            })))
            .mount(&self.auth0_mock)
            .await;
    }

    /// Serve a user record on the management API lookup endpoint.
    pub async fn mount_user(&self, expected_calls: u64, id: &str, body: Value) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(format!("/api/v2/users/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expected_calls)
            .mount(&self.auth0_mock)
            .await;
    }

    /// Send a GET request with no Authorization header.
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.as_ref())
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Send a GET request with a raw Authorization header value.
    pub async fn get_with_auth(&self, uri: impl AsRef<str>, auth: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.as_ref())
            .header("Authorization", auth)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Send a GET request bearing the given token.
    pub async fn get_with_token(&self, uri: impl AsRef<str>, token: &str) -> TestResponse {
        self.get_with_auth(uri, &format!("Bearer {token}")).await
    }

    /// Sends a request through the router and collects the response.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to an empty object on non-JSON or
        // empty bodies.
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        TestResponse {
            status,
            headers,
            json,
        }
    }
}

/// Response from a test request
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: http::HeaderMap,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Asserts a response header value.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let value = self
            .headers
            .get(name)
            .unwrap_or_else(|| panic!("header {name} not set"));
        assert_eq!(value, expected, "unexpected value for header {name}");
        self
    }
}
