//! Authentication provider for the Mammoth API.
//!
//! Credentials are attached to each outgoing request; nothing global is
//! mutated, so one provider can serve concurrent calls.

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-KEY";
/// Header carrying the API secret
pub const API_SECRET_HEADER: &str = "X-API-SECRET";

/// Credentials for the Mammoth API.
///
/// # Examples
///
/// ```rust
/// use mammoth_client::AuthProvider;
///
/// let auth = AuthProvider::api_key("key", "secret");
/// assert!(auth.is_authenticated());
/// ```
#[derive(Clone)]
pub enum AuthProvider {
    /// API key + secret pair
    ApiKey { key: String, secret: String },

    /// No credentials (requests will typically be rejected with 401)
    None,
}

impl AuthProvider {
    pub fn api_key(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::ApiKey {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn none() -> Self {
        Self::None
    }

    /// Header name/value pairs to attach to a request
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::ApiKey { key, secret } => vec![
                (API_KEY_HEADER, key.clone()),
                (API_SECRET_HEADER, secret.clone()),
            ],
            Self::None => Vec::new(),
        }
    }

    /// Attach authentication headers to an HTTP request builder
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        self.headers()
            .into_iter()
            .fold(request, |req, (name, value)| req.header(name, value))
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

// Secrets stay out of debug output and logs
impl std::fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey { key, .. } => f
                .debug_struct("ApiKey")
                .field("key", &mask(key))
                .field("secret", &"***")
                .finish(),
            Self::None => write!(f, "None"),
        }
    }
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}***", visible)
}
