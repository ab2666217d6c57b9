//! Authenticated API gateway connections.
//!
//! A connection binds a gateway base URL to an HTTP client that already
//! carries its bearer token, so workers never deal with authentication
//! mid-attack. Tokens are obtained once per connection at startup by
//! exchanging an offline token at the SSO token endpoint.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use url::Url;

/// User agent sent with every request.
pub const USER_AGENT: &str = "surge/0.1.0";

/// Per-request timeout applied to every exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while building or using a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("access token is not a valid header value")]
    InvalidToken,

    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("token exchange request failed: {0}")]
    TokenExchange(#[source] reqwest::Error),

    #[error("token endpoint returned status {status}")]
    TokenRejected { status: u16 },

    #[error("request to {path:?} failed: {source}")]
    Request {
        path: String,
        source: reqwest::Error,
    },

    #[error("response from {path:?} is missing field {field:?}")]
    MissingField {
        path: &'static str,
        field: &'static str,
    },
}

/// Credentials and endpoints needed to establish a connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub gateway_url: String,
    pub token_url: String,
    pub offline_token: String,
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// A pre-authenticated connection to the API gateway.
///
/// Cloning the inner client is cheap; exactly one worker uses a given
/// connection at a time during a scenario.
#[derive(Debug, Clone)]
pub struct ApiConnection {
    base: Url,
    client: reqwest::Client,
}

impl ApiConnection {
    /// Exchanges the offline token and builds an authenticated connection.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::TokenExchange` / `TokenRejected` - If the SSO
    ///   endpoint is unreachable or refuses the offline token
    /// - `ConnectionError::InvalidUrl` - If the gateway URL does not parse
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let access_token = exchange_token(config).await?;
        Self::with_access_token(&config.gateway_url, &access_token)
    }

    /// Builds a connection around an already-issued access token.
    pub fn with_access_token(gateway_url: &str, access_token: &str) -> Result<Self, ConnectionError> {
        let base = Url::parse(gateway_url).map_err(|source| ConnectionError::InvalidUrl {
            url: gateway_url.to_string(),
            source,
        })?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| ConnectionError::InvalidToken)?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ConnectionError::Client)?;

        Ok(Self { base, client })
    }

    /// The authenticated HTTP client backing this connection.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Joins an API path onto the gateway base URL.
    pub fn absolute(&self, path: &str) -> Result<Url, ConnectionError> {
        self.base.join(path).map_err(|source| ConnectionError::InvalidUrl {
            url: path.to_string(),
            source,
        })
    }

    /// Fetches the current account's registry authorization token, needed
    /// by the cluster registration endpoints.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::MissingField` - If the response carries no
    ///   `auth` entry
    pub async fn authorization_token(&self) -> Result<String, ConnectionError> {
        let path = crate::scenario::SELF_ACCESS_TOKEN_PATH;
        let url = self.absolute(path)?;
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|source| ConnectionError::Request {
                path: path.to_string(),
                source,
            })?;
        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|source| ConnectionError::Request {
                    path: path.to_string(),
                    source,
                })?;

        body.get("auths")
            .and_then(|auths| auths.as_object())
            .and_then(|auths| auths.values().next())
            .and_then(|registry| registry.get("auth"))
            .and_then(|auth| auth.as_str())
            .map(str::to_string)
            .ok_or(ConnectionError::MissingField {
                path: crate::scenario::SELF_ACCESS_TOKEN_PATH,
                field: "auths.*.auth",
            })
    }

    /// Resolves the organization id of the current account.
    pub async fn organization_id(&self) -> Result<String, ConnectionError> {
        let path = crate::scenario::CURRENT_ACCOUNT_PATH;
        let url = self.absolute(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ConnectionError::Request {
                path: path.to_string(),
                source,
            })?;
        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|source| ConnectionError::Request {
                    path: path.to_string(),
                    source,
                })?;

        body.get("organization")
            .and_then(|org| org.get("id"))
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or(ConnectionError::MissingField {
                path: crate::scenario::CURRENT_ACCOUNT_PATH,
                field: "organization.id",
            })
    }
}

/// Performs the refresh-token grant against the SSO token endpoint.
async fn exchange_token(config: &ConnectionConfig) -> Result<String, ConnectionError> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("client_id", config.client_id.as_str()),
        ("refresh_token", config.offline_token.as_str()),
    ];
    if let Some(secret) = &config.client_secret {
        form.push(("client_secret", secret.as_str()));
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(ConnectionError::Client)?;

    let response = client
        .post(&config.token_url)
        .form(&form)
        .send()
        .await
        .map_err(ConnectionError::TokenExchange)?;
    if !response.status().is_success() {
        return Err(ConnectionError::TokenRejected {
            status: response.status().as_u16(),
        });
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(ConnectionError::TokenExchange)?;
    body.get("access_token")
        .and_then(|token| token.as_str())
        .map(str::to_string)
        .ok_or(ConnectionError::MissingField {
            path: "token endpoint",
            field: "access_token",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_access_token_builds_client() {
        let connection =
            ApiConnection::with_access_token("https://api.example.com", "abc.def.ghi").unwrap();
        assert_eq!(connection.base().as_str(), "https://api.example.com/");
    }

    #[test]
    fn test_with_access_token_rejects_bad_gateway_url() {
        assert!(matches!(
            ApiConnection::with_access_token("not a url", "token"),
            Err(ConnectionError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_with_access_token_rejects_unprintable_token() {
        assert!(matches!(
            ApiConnection::with_access_token("https://api.example.com", "bad\ntoken"),
            Err(ConnectionError::InvalidToken)
        ));
    }

    #[test]
    fn test_absolute_joins_api_paths() {
        let connection =
            ApiConnection::with_access_token("https://api.example.com", "token").unwrap();
        let url = connection
            .absolute("/api/clusters_mgmt/v1/clusters")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/clusters_mgmt/v1/clusters"
        );
    }
}
