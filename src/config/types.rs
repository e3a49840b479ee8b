use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Emote-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub client: ClientProfile,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub output: OutputConfig,
}

/// Enumeration range and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// First ID to fetch
    #[serde(rename = "start-id")]
    pub start_id: i64,

    /// Upper bound used when range discovery fails
    #[serde(rename = "fallback-end-id")]
    pub fallback_end_id: i64,

    /// Listing page size used by range discovery
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Extra IDs scanned past the discovered bound
    #[serde(default = "default_lookahead")]
    pub lookahead: i64,

    /// IDs never fetched
    #[serde(default)]
    pub ignore: Vec<i64>,

    /// Number of fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Largest ID span a discovered bound may open up
    #[serde(rename = "max-range", default = "default_max_range")]
    pub max_range: i64,
}

/// Account whose credential signs the run
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub id: i64,
}

/// Network behavior shared by every outbound call
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-call timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Total attempts for a call that fails at the transport level
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Proxy URL applied to every outbound call
    #[serde(default)]
    pub proxy: Option<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            proxy: None,
        }
    }
}

/// Client identity sent with every request
#[derive(Debug, Clone, Deserialize)]
pub struct ClientProfile {
    #[serde(default = "default_build")]
    pub build: u32,

    #[serde(rename = "mobi-app", default = "default_mobi_app")]
    pub mobi_app: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default = "default_statistics")]
    pub statistics: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            build: default_build(),
            mobi_app: default_mobi_app(),
            platform: default_platform(),
            channel: default_channel(),
            statistics: default_statistics(),
            locale: default_locale(),
            user_agent: default_user_agent(),
        }
    }
}

/// Content API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the content API
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "app-key")]
    pub app_key: String,

    #[serde(rename = "app-secret")]
    pub app_secret: String,

    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,

    #[serde(rename = "detail-path", default = "default_detail_path")]
    pub detail_path: String,

    /// Send access key and cookies on listing requests
    #[serde(rename = "listing-send-credentials", default = "default_true")]
    pub listing_send_credentials: bool,

    /// Send access key and cookies on detail requests
    #[serde(rename = "detail-send-credentials", default)]
    pub detail_send_credentials: bool,

    #[serde(default = "default_business")]
    pub business: String,

    /// Referer for listing requests
    #[serde(rename = "listing-referer", default = "default_listing_referer")]
    pub listing_referer: String,

    /// Referer for detail requests; `{id}` is replaced with the package ID
    #[serde(rename = "detail-referer", default = "default_detail_referer")]
    pub detail_referer: String,
}

impl ApiConfig {
    pub fn listing_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.listing_path)
    }

    pub fn detail_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.detail_path)
    }
}

/// Auth endpoint and refresh policy
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "refresh-url")]
    pub refresh_url: String,

    #[serde(rename = "app-key")]
    pub app_key: String,

    #[serde(rename = "app-secret")]
    pub app_secret: String,

    /// Client build reported to the auth endpoint
    #[serde(default = "default_auth_build")]
    pub build: u32,

    /// Credential age (days) after which a refresh is required
    #[serde(rename = "stale-after-days", default = "default_stale_after_days")]
    pub stale_after_days: i64,
}

/// Credential store location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Persisted resource location
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one JSON file per package
    pub directory: String,
}

fn default_page_size() -> u32 {
    100
}

fn default_lookahead() -> i64 {
    50
}

fn default_concurrency() -> usize {
    20
}

fn default_max_range() -> i64 {
    1_000_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_build() -> u32 {
    8_230_800
}

fn default_auth_build() -> u32 {
    6_750_200
}

fn default_mobi_app() -> String {
    "android_i".to_string()
}

fn default_platform() -> String {
    "android".to_string()
}

fn default_channel() -> String {
    "master".to_string()
}

fn default_statistics() -> String {
    r#"{"appId":14,"platform":3,"version":"3.20.4","abtest":""}"#.to_string()
}

fn default_locale() -> String {
    "zh_CN".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Linux; Android 13; Mi 10 Build/TKQ1.221114.001; wv) AppleWebKit/537.36 \
     (KHTML, like Gecko) Version/4.0 Chrome/135.0.7049.111 Mobile Safari/537.36 os/android \
     model/Mi 10 build/8230800 osVer/13 sdkInt/33 network/2 BiliApp/8230800 mobi_app/android_i \
     channel/master innerVer/8230800 c_locale/zh_CN s_locale/zh_CN disable_rcmd/0 3.20.4"
        .to_string()
}

fn default_listing_path() -> String {
    "/bapis/main.community.interface.emote.EmoteService/AllPackages".to_string()
}

fn default_detail_path() -> String {
    "/bapis/main.community.interface.emote.EmoteService/PackageDetail".to_string()
}

fn default_true() -> bool {
    true
}

fn default_business() -> String {
    "reply".to_string()
}

fn default_listing_referer() -> String {
    "https://www.bilibili.com/h5/mall/emoji-package/more?navhide=1&native.theme=0".to_string()
}

fn default_detail_referer() -> String {
    "https://www.bilibili.com/h5/mall/emoji-package/detail/{id}?navhide=1&native.theme=0"
        .to_string()
}

fn default_stale_after_days() -> i64 {
    30
}
