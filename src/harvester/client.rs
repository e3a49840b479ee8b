//! HTTP client construction and signed content-API requests
//!
//! This module handles:
//! - Building HTTP clients with the configured timeout and user agent
//! - Assembling the common parameter set for listing and detail calls
//! - Signing every request and attaching endpoint-specific headers
//! - Classifying responses into transport, status and body errors

use crate::config::{ClientProfile, Config, HttpConfig};
use crate::credential::Credential;
use crate::sign::{sign, ParamValue, SignedRequest};
use crate::FetchError;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE, REFERER};
use reqwest::{Client, Proxy, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

/// Builds an HTTP client with proper configuration
///
/// Each fetch worker calls this once and keeps the client for its lifetime,
/// so connections are reused within a worker but never shared across workers.
pub fn build_http_client(http: &HttpConfig, profile: &ClientProfile) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(profile.user_agent.clone())
        .timeout(http.timeout())
        .connect_timeout(http.timeout())
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &http.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// Current Unix timestamp in seconds, sent as `ts` on every call
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Content-API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Paged list of all packages
    Listing,

    /// Full detail of one package
    Detail,
}

/// Top-level response wrapper shared by all endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,

    #[serde(default)]
    pub message: String,

    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Converts a non-zero code into an application error
    pub fn into_data(self) -> Result<Option<T>, FetchError> {
        if self.code != 0 {
            return Err(FetchError::Application {
                code: self.code,
                message: self.message,
            });
        }
        Ok(self.data)
    }
}

/// Builds and sends signed requests against the content API
#[derive(Debug, Clone)]
pub struct SignedApi {
    config: Arc<Config>,
}

impl SignedApi {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the access key and cookies are sent to this endpoint
    pub fn sends_credentials(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Listing => self.config.api.listing_send_credentials,
            Endpoint::Detail => self.config.api.detail_send_credentials,
        }
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        match endpoint {
            Endpoint::Listing => self.config.api.listing_url(),
            Endpoint::Detail => self.config.api.detail_url(),
        }
    }

    /// Parameters common to every content-API call
    fn base_params(
        &self,
        credential: &Credential,
        endpoint: Endpoint,
        ts: i64,
    ) -> Vec<(&'static str, ParamValue)> {
        let profile = &self.config.client;
        let access_key = if self.sends_credentials(endpoint) {
            credential.access_token.clone()
        } else {
            String::new()
        };

        vec![
            ("access_key", ParamValue::Str(access_key)),
            ("build", ParamValue::from(profile.build)),
            ("business", ParamValue::from(self.config.api.business.as_str())),
            ("channel", ParamValue::from(profile.channel.as_str())),
            ("disable_rcmd", ParamValue::Int(0)),
            ("mobi_app", ParamValue::from(profile.mobi_app.as_str())),
            ("platform", ParamValue::from(profile.platform.as_str())),
            ("statistics", ParamValue::from(profile.statistics.as_str())),
            ("ts", ParamValue::Int(ts)),
        ]
    }

    /// Signed parameters for one listing page
    pub fn listing_request(
        &self,
        credential: &Credential,
        page: u32,
        page_size: u32,
        ts: i64,
    ) -> SignedRequest {
        let mut params = self.base_params(credential, Endpoint::Listing, ts);
        params.push(("pn", ParamValue::from(page)));
        params.push(("ps", ParamValue::from(page_size)));
        params.push(("search", ParamValue::from("")));
        sign(params, &self.config.api.app_key, &self.config.api.app_secret)
    }

    /// Signed parameters for one package detail
    pub fn detail_request(&self, credential: &Credential, id: i64, ts: i64) -> SignedRequest {
        let mut params = self.base_params(credential, Endpoint::Detail, ts);
        params.push(("id", ParamValue::Int(id)));
        sign(params, &self.config.api.app_key, &self.config.api.app_secret)
    }

    /// Endpoint-specific headers
    ///
    /// The cookie header is only attached when the endpoint is configured to
    /// send credentials.
    pub fn headers(&self, credential: &Credential, endpoint: Endpoint, id: Option<i64>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(
            HeaderName::from_static("native_api_from"),
            HeaderValue::from_static("h5"),
        );
        headers.insert(
            HeaderName::from_static("bili-http-engine"),
            HeaderValue::from_static("cronet"),
        );

        let referer = match (endpoint, id) {
            (Endpoint::Detail, Some(id)) => self
                .config
                .api
                .detail_referer
                .replace("{id}", &id.to_string()),
            _ => self.config.api.listing_referer.clone(),
        };
        insert_header(&mut headers, REFERER, &referer);

        if self.sends_credentials(endpoint) && !credential.cookies.is_empty() {
            insert_header(&mut headers, COOKIE, &credential.cookie_header());
        }

        headers
    }

    /// Sends one signed GET and decodes the envelope
    ///
    /// # Error Classification
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Connect failure, timeout, body read failure | `Transport` |
    /// | Status other than 200 | `Status` |
    /// | Body is not the expected JSON | `Malformed` |
    ///
    /// A non-zero application code is left in the envelope for the caller.
    pub async fn get<T: DeserializeOwned>(
        &self,
        client: &Client,
        endpoint: Endpoint,
        signed: &SignedRequest,
        headers: HeaderMap,
    ) -> Result<ApiEnvelope<T>, FetchError> {
        // The query goes out exactly as it was signed
        let url = format!("{}?{}", self.url(endpoint), signed.to_query_string());
        let response = client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(transport_error)?;

        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => tracing::warn!("Skipping invalid {} header: {}", name, e),
    }
}

/// Classifies a reqwest error as a (retryable) transport failure
pub fn transport_error(error: reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };

    FetchError::Transport {
        attempts: 1,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::credential::Cookie;

    fn test_config() -> Arc<Config> {
        let config = parse_config(
            r#"
[scan]
start-id = 1
fallback-end-id = 100

[account]
id = 42

[api]
base-url = "https://api.example.com/"
app-key = "content-key"
app-secret = "content-secret"

[auth]
refresh-url = "https://passport.example.com/refresh"
app-key = "auth-key"
app-secret = "auth-secret"

[storage]
database-path = "./accounts.db"

[output]
directory = "./list"
"#,
        )
        .unwrap();
        Arc::new(config)
    }

    fn test_credential() -> Credential {
        Credential {
            account_id: 42,
            access_token: "token-abc".to_string(),
            refresh_token: "refresh-abc".to_string(),
            cookies: vec![Cookie::new("SESSDATA", "s"), Cookie::new("bili_jct", "j")],
            last_refreshed: Utc::now(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&HttpConfig::default(), &ClientProfile::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let http = HttpConfig {
            proxy: Some("http://127.0.0.1:7890".to_string()),
            ..HttpConfig::default()
        };
        assert!(build_http_client(&http, &ClientProfile::default()).is_ok());
    }

    #[test]
    fn test_listing_request_carries_access_key() {
        let api = SignedApi::new(test_config());
        let signed = api.listing_request(&test_credential(), 3, 100, 1700000000);

        assert_eq!(signed.get("access_key"), Some("token-abc"));
        assert_eq!(signed.get("pn"), Some("3"));
        assert_eq!(signed.get("ps"), Some("100"));
        assert_eq!(signed.get("ts"), Some("1700000000"));
        assert_eq!(signed.get("appkey"), Some("content-key"));
        assert!(signed.get("sign").is_some());
    }

    #[test]
    fn test_detail_request_blanks_access_key_by_default() {
        let api = SignedApi::new(test_config());
        let signed = api.detail_request(&test_credential(), 10, 1700000000);

        assert_eq!(signed.get("access_key"), Some(""));
        assert_eq!(signed.get("id"), Some("10"));
        assert_eq!(signed.get("mobi_app"), Some("android_i"));
    }

    #[test]
    fn test_detail_headers() {
        let api = SignedApi::new(test_config());
        let headers = api.headers(&test_credential(), Endpoint::Detail, Some(10));

        let referer = headers.get(REFERER).unwrap().to_str().unwrap();
        assert!(referer.contains("/detail/10?"));
        assert!(headers.get(COOKIE).is_none());
    }

    #[test]
    fn test_listing_headers_send_cookie() {
        let api = SignedApi::new(test_config());
        let headers = api.headers(&test_credential(), Endpoint::Listing, None);

        assert_eq!(
            headers.get(COOKIE).unwrap().to_str().unwrap(),
            "SESSDATA=s;bili_jct=j"
        );
    }

    #[test]
    fn test_endpoint_urls_trim_slash() {
        let api = SignedApi::new(test_config());
        assert!(api
            .url(Endpoint::Listing)
            .starts_with("https://api.example.com/bapis/"));
    }

    #[test]
    fn test_envelope_into_data() {
        let ok: ApiEnvelope<u32> = serde_json::from_str(r#"{"code":0,"data":5}"#).unwrap();
        assert_eq!(ok.into_data().unwrap(), Some(5));

        let missing: ApiEnvelope<u32> = serde_json::from_str(r#"{"code":0}"#).unwrap();
        assert_eq!(missing.into_data().unwrap(), None);

        let err: ApiEnvelope<u32> =
            serde_json::from_str(r#"{"code":-101,"message":"not logged in"}"#).unwrap();
        assert_eq!(
            err.into_data().unwrap_err(),
            FetchError::Application {
                code: -101,
                message: "not logged in".to_string()
            }
        );
    }
}
