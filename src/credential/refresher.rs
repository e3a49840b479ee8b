//! Token refresh against the remote auth endpoint
//!
//! A stored credential older than the staleness threshold is exchanged for a
//! new one before any content request is made. Every exchange is recorded in
//! the audit log before its outcome is acted on, and any failure is fatal.

use crate::config::Config;
use crate::credential::{
    AuditLog, Cookie, Credential, CredentialState, CredentialStore, RefreshAuditEntry,
};
use crate::harvester::{transport_error, RetryPolicy};
use crate::sign::{sign, ParamValue, SignedRequest};
use crate::{CredentialError, FetchError};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    code: i64,

    #[serde(default)]
    message: String,

    data: Option<RefreshData>,
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    token_info: TokenInfo,
    cookie_info: CookieInfo,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    mid: i64,
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct CookieInfo {
    cookies: Vec<Cookie>,
}

/// How a refresh exchange ended, decided before anything is written
enum Exchange {
    Refreshed(Credential),
    Rejected { code: i64, message: String },
    Malformed(String),
    Transport(String),
}

impl Exchange {
    fn label(&self) -> &'static str {
        match self {
            Self::Refreshed(_) => "success",
            Self::Rejected { .. } => "rejected",
            Self::Malformed(_) => "malformed",
            Self::Transport(_) => "transport",
        }
    }
}

/// Keeps an account's credential within the staleness threshold
pub struct TokenRefresher {
    client: Client,
    config: Arc<Config>,
    retry: RetryPolicy,
}

impl TokenRefresher {
    pub fn new(client: Client, config: Arc<Config>) -> Self {
        Self {
            client,
            config,
            retry: RetryPolicy::single_attempt(),
        }
    }

    /// Age after which a credential must be refreshed
    pub fn threshold(&self) -> Duration {
        Duration::days(self.config.auth.stale_after_days)
    }

    /// Returns a credential that is fresh as of now
    pub async fn ensure_fresh<S>(
        &self,
        store: &Mutex<S>,
        account_id: i64,
    ) -> Result<Credential, CredentialError>
    where
        S: CredentialStore + AuditLog,
    {
        self.ensure_fresh_at(store, account_id, Utc::now()).await
    }

    /// Returns a credential that is fresh as of `now`
    ///
    /// The store lock is only taken for the synchronous reads and writes; it
    /// is never held while the refresh request is in flight.
    pub async fn ensure_fresh_at<S>(
        &self,
        store: &Mutex<S>,
        account_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Credential, CredentialError>
    where
        S: CredentialStore + AuditLog,
    {
        let stored = lock(store).get(account_id)?;
        let current = stored.ok_or(CredentialError::NotFound(account_id))?;

        let state = CredentialState::classify(&current, now, self.threshold());
        if state.is_usable() {
            tracing::debug!(
                "Credential for account {} is {} (last refreshed {})",
                account_id,
                state,
                current.last_refreshed
            );
            return Ok(current);
        }

        tracing::info!(
            "Credential for account {} is {} (last refreshed {}), refreshing",
            account_id,
            state,
            current.last_refreshed
        );

        let refreshing = advance(account_id, state, CredentialState::Refreshing);
        let (exchange, response) = self.exchange(&current, now).await;

        let audited = lock(store).append_refresh_attempt(&RefreshAuditEntry {
            account_id,
            attempted_at: now,
            outcome: exchange.label().to_string(),
            response,
        });

        let error = match exchange {
            Exchange::Refreshed(credential) => {
                // The old refresh token is spent once the remote has answered,
                // so the new tokens are stored even when the audit write fails
                lock(store).update(&credential)?;
                advance(account_id, refreshing, CredentialState::Fresh);

                if let Err(e) = audited {
                    tracing::error!(
                        "Credential for account {} refreshed but not audited: {}",
                        account_id,
                        e
                    );
                    return Err(e.into());
                }

                tracing::info!("Credential for account {} refreshed", account_id);
                return Ok(credential);
            }
            Exchange::Rejected { code, message } => {
                tracing::error!(
                    "Refresh rejected for account {} (code {}): {}",
                    account_id,
                    code,
                    message
                );
                CredentialError::Rejected {
                    account_id,
                    code,
                    message,
                }
            }
            Exchange::Malformed(message) => {
                tracing::error!("Malformed refresh response for account {}: {}", account_id, message);
                CredentialError::Malformed {
                    account_id,
                    message,
                }
            }
            Exchange::Transport(message) => {
                tracing::error!("Refresh request for account {} failed: {}", account_id, message);
                CredentialError::Transport {
                    account_id,
                    message,
                }
            }
        };

        advance(account_id, refreshing, CredentialState::Failed);
        audited?;
        Err(error)
    }

    /// Signed form body for one refresh call
    pub fn refresh_request(&self, credential: &Credential, ts: i64) -> SignedRequest {
        let profile = &self.config.client;
        let params = vec![
            ("access_key", ParamValue::from(credential.access_token.as_str())),
            ("build", ParamValue::from(self.config.auth.build)),
            ("c_locale", ParamValue::from(profile.locale.as_str())),
            ("channel", ParamValue::from(profile.channel.as_str())),
            ("device", ParamValue::from("phone")),
            ("disable_rcmd", ParamValue::Int(0)),
            ("from_access_key", ParamValue::from(credential.access_token.as_str())),
            ("mobi_app", ParamValue::from(profile.mobi_app.as_str())),
            ("platform", ParamValue::from(profile.platform.as_str())),
            ("refresh_token", ParamValue::from(credential.refresh_token.as_str())),
            ("s_locale", ParamValue::from(profile.locale.as_str())),
            ("statistics", ParamValue::from(profile.statistics.as_str())),
            ("sts", ParamValue::Int(ts)),
            ("ts", ParamValue::Int(ts)),
        ];
        sign(params, &self.config.auth.app_key, &self.config.auth.app_secret)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("env"), HeaderValue::from_static("prod"));
        headers.insert(
            HeaderName::from_static("bili-http-engine"),
            HeaderValue::from_static("cronet"),
        );
        match HeaderValue::from_str(&self.config.client.mobi_app) {
            Ok(value) => {
                headers.insert(HeaderName::from_static("app-key"), value);
            }
            Err(e) => tracing::warn!("Skipping invalid app-key header: {}", e),
        }
        headers
    }

    /// Performs the call and classifies it, returning the text to audit
    async fn exchange(&self, current: &Credential, now: DateTime<Utc>) -> (Exchange, String) {
        let signed = self.refresh_request(current, now.timestamp());
        let url = self.config.auth.refresh_url.as_str();

        let sent = self
            .retry
            .run(
                "Token refresh",
                |_| {
                    let request = self
                        .client
                        .post(url)
                        .headers(self.headers())
                        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                        .body(signed.to_query_string());
                    async move {
                        match request.send().await {
                            Ok(response) => response.text().await.map_err(transport_error),
                            Err(e) => Err(transport_error(e)),
                        }
                    }
                },
                FetchError::is_transport,
            )
            .await;

        let body = match sent {
            Ok(body) => body,
            Err(failure) => {
                let message = failure.error.to_string();
                return (Exchange::Transport(message.clone()), message);
            }
        };

        let exchange = classify_response(current.account_id, &body, now);
        (exchange, body)
    }
}

fn classify_response(account_id: i64, body: &str, now: DateTime<Utc>) -> Exchange {
    let parsed: RefreshResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => return Exchange::Malformed(e.to_string()),
    };

    if parsed.code != 0 {
        return Exchange::Rejected {
            code: parsed.code,
            message: parsed.message,
        };
    }

    let Some(data) = parsed.data else {
        return Exchange::Malformed("response has no data".to_string());
    };

    if data.token_info.mid != account_id {
        tracing::warn!(
            "Refresh response names account {}, updating configured account {}",
            data.token_info.mid,
            account_id
        );
    }

    Exchange::Refreshed(Credential {
        account_id,
        access_token: data.token_info.access_token,
        refresh_token: data.token_info.refresh_token,
        cookies: data.cookie_info.cookies,
        last_refreshed: now,
    })
}

/// Moves a credential between lifecycle states
fn advance(account_id: i64, from: CredentialState, to: CredentialState) -> CredentialState {
    debug_assert!(
        from.can_transition_to(to),
        "illegal credential transition {} -> {}",
        from,
        to
    );
    tracing::debug!("Credential for account {}: {} -> {}", account_id, from, to);
    to
}

/// Locks the store, recovering the guard if a previous holder panicked
fn lock<S>(store: &Mutex<S>) -> MutexGuard<'_, S> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
