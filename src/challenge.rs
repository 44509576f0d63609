use std::{fmt, thread, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    account::{Account, AccountError},
    dns::{DnsError, DnsProvider},
    key_pair::sha256_base64_url,
    payload::{ChallengeReadyPayload, Identifier, Payload, PayloadError, PayloadT},
    protection::KeyBinding,
    transport::{Transport, TransportError},
};

/// 定義與挑戰（Challenge）流程相關的錯誤類型。
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("Account error: {0}")]
    Account(#[from] AccountError),
    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),
    #[error("No dns-01 challenge offered for {0}")]
    NoDnsChallenge(String),
    #[error("Authorization for {identifier} is {status}, expected valid")]
    AuthorizationNotValid {
        identifier: String,
        status: AuthorizationStatus,
    },
    #[error("Validation worker for {0} panicked")]
    WorkerPanicked(String),
}

type Result<T> = std::result::Result<T, ChallengeError>;

/// DNS-01 驗證記錄的名稱前綴。
pub const DNS_RECORD_PREFIX: &str = "_acme-challenge.";
/// 發布記錄後、通知 CA 前的等待時間。
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(30);
/// 輪詢授權狀態的間隔。
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// 輪詢授權狀態的最大次數。
pub const DEFAULT_POLL_ATTEMPTS: u32 = 20;

/// 表示 ACME 挑戰的類型，本庫只處理 `dns-01`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ChallengeType {
    #[serde(rename = "http-01")]
    Http01,
    #[serde(rename = "dns-01")]
    Dns01,
    #[serde(rename = "tls-alpn-01")]
    TlsAlpn01,
    #[serde(other)]
    Unknown,
}

/// 表示 ACME 挑戰的狀態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

/// 授權狀態，依 RFC 8555 §7.1.6。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Deactivated => "deactivated",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 表示一個 ACME 驗證挑戰。
#[derive(Debug, Clone, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,
    pub url: String,
    #[serde(default)]
    pub token: String,
    pub status: ChallengeStatus,
}

/// 一個識別項的授權資料。
#[derive(Debug, Clone, Deserialize)]
pub struct Authorization {
    pub status: AuthorizationStatus,
    pub expires: Option<String>,
    /// 萬用字元授權的識別項值已被 CA 去除 `*.`。
    pub identifier: Identifier,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub wildcard: bool,
}

impl Authorization {
    pub fn dns_challenge(&self) -> Option<&Challenge> {
        self.challenges
            .iter()
            .find(|c| c.challenge_type == ChallengeType::Dns01)
    }

    /// 預設的 TXT 記錄名稱 `_acme-challenge.<識別項>`。
    pub fn record_name(&self) -> String {
        let value = &self.identifier.value;
        format!(
            "{}{}",
            DNS_RECORD_PREFIX,
            value.strip_prefix("*.").unwrap_or(value)
        )
    }
}

/// 計算 DNS-01 的 TXT 記錄值：`base64url(SHA-256(token + "." + thumbprint))`。
///
/// # 範例
///
/// ```
/// use dns01_acme::challenge::dns_txt_value;
///
/// let value = dns_txt_value("token", "thumbprint");
/// assert_eq!(value.len(), 43);
/// assert_eq!(value, dns_txt_value("token", "thumbprint"));
/// ```
pub fn dns_txt_value(token: &str, thumbprint: &str) -> String {
    sha256_base64_url(format!("{}.{}", token, thumbprint).as_bytes())
}

/// 驗證流程的等待與輪詢設定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub settle_delay: Duration,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    /// 不等待的設定，適合本地測試 CA。
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            interval: Duration::ZERO,
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

/// 單一授權的驗證結果。
#[derive(Debug)]
pub struct AuthorizationOutcome {
    pub url: String,
    pub result: Result<()>,
}

/// 以 DNS-01 完成一張訂單的所有授權。
///
/// 每個授權在自己的執行緒中處理：發布 TXT 記錄、通知 CA、輪詢狀態、刪除記錄。
/// 全部結束後重新讀取每個授權，必須全數為 `valid` 才算成功。
#[derive(Debug)]
pub struct ChallengeResolver<'a> {
    transport: &'a Transport,
    account: &'a Account,
    dns: &'a dyn DnsProvider,
    policy: PollPolicy,
}

impl<'a> ChallengeResolver<'a> {
    pub fn new(
        transport: &'a Transport,
        account: &'a Account,
        dns: &'a dyn DnsProvider,
        policy: PollPolicy,
    ) -> Self {
        Self {
            transport,
            account,
            dns,
            policy,
        }
    }

    /// 驗證所有授權。
    ///
    /// 個別執行緒的錯誤只會記錄並回傳在結果中，是否成功以最後的重新檢查為準。
    ///
    /// # 參數
    ///
    /// - `authorizations`: 訂單的授權 URL 列表
    /// - `txt_cname`: 若指定，所有 TXT 記錄都發布到此名稱（CNAME 委派）
    pub fn resolve_all(
        &self,
        authorizations: &[String],
        txt_cname: Option<&str>,
    ) -> Result<Vec<AuthorizationOutcome>> {
        let outcomes = self.fan_out(authorizations, txt_cname)?;
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                warn!(url = %outcome.url, error = %e, "authorization worker failed");
            }
        }

        self.verify_all(authorizations)?;
        Ok(outcomes)
    }

    /// 同時處理每個授權，等待全部結束後回傳各自的結果。
    pub fn fan_out(
        &self,
        authorizations: &[String],
        txt_cname: Option<&str>,
    ) -> Result<Vec<AuthorizationOutcome>> {
        let thumbprint = self.account.thumbprint()?;
        let thumbprint = thumbprint.as_str();

        let outcomes: Vec<AuthorizationOutcome> = thread::scope(|scope| {
            let handles: Vec<_> = authorizations
                .iter()
                .map(|url| scope.spawn(move || self.resolve_one(url, txt_cname, thumbprint)))
                .collect();

            handles
                .into_iter()
                .zip(authorizations)
                .map(|(handle, url)| AuthorizationOutcome {
                    url: url.clone(),
                    result: handle
                        .join()
                        .unwrap_or_else(|_| Err(ChallengeError::WorkerPanicked(url.clone()))),
                })
                .collect()
        });

        Ok(outcomes)
    }

    /// 依序重新讀取每個授權，遇到第一個非 `valid` 即失敗。
    pub fn verify_all(&self, authorizations: &[String]) -> Result<()> {
        for url in authorizations {
            let authorization = self.fetch(url)?;
            if authorization.status != AuthorizationStatus::Valid {
                return Err(ChallengeError::AuthorizationNotValid {
                    identifier: authorization.identifier.value,
                    status: authorization.status,
                });
            }
        }
        Ok(())
    }

    /// 以 POST-as-GET 讀取授權。
    pub fn fetch(&self, url: &str) -> Result<Authorization> {
        let response = self.transport.post(
            &self.account.key_pair,
            KeyBinding::Kid(&self.account.account_url),
            url,
            &Payload::post_as_get(),
        )?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    fn resolve_one(&self, url: &str, txt_cname: Option<&str>, thumbprint: &str) -> Result<()> {
        let authorization = self.fetch(url)?;
        if authorization.status != AuthorizationStatus::Pending {
            debug!(url, status = %authorization.status, "authorization not pending, skipped");
            return Ok(());
        }

        let identifier = authorization.identifier.value.clone();
        let challenge = authorization
            .dns_challenge()
            .ok_or_else(|| ChallengeError::NoDnsChallenge(identifier.clone()))?;

        let name = match txt_cname {
            Some(cname) if !cname.is_empty() => cname.to_string(),
            _ => authorization.record_name(),
        };
        let value = dns_txt_value(&challenge.token, thumbprint);

        self.dns.add_record("TXT", &name, &value)?;
        info!(identifier = %identifier, record = %name, "TXT record published");

        let validated = self.notify_and_poll(url, &challenge.url, &identifier);

        let cleanup = self.dns.delete_record("TXT", &name, &value);
        match &cleanup {
            Ok(()) => info!(record = %name, "TXT record retracted"),
            Err(e) => warn!(record = %name, error = %e, "failed to retract TXT record"),
        }

        validated?;
        Ok(cleanup?)
    }

    fn notify_and_poll(
        &self,
        authorization_url: &str,
        challenge_url: &str,
        identifier: &str,
    ) -> Result<()> {
        thread::sleep(self.policy.settle_delay);

        let ready = ChallengeReadyPayload::default().to_payload()?;
        self.transport.post(
            &self.account.key_pair,
            KeyBinding::Kid(&self.account.account_url),
            challenge_url,
            &ready,
        )?;

        let mut status = AuthorizationStatus::Pending;
        for attempt in 1..=self.policy.max_attempts {
            status = self.fetch(authorization_url)?.status;
            debug!(identifier, attempt, status = %status, "polled authorization");
            if status != AuthorizationStatus::Pending {
                break;
            }
            if attempt < self.policy.max_attempts {
                thread::sleep(self.policy.interval);
            }
        }

        match status {
            AuthorizationStatus::Valid => Ok(()),
            status => Err(ChallengeError::AuthorizationNotValid {
                identifier: identifier.to_string(),
                status,
            }),
        }
    }
}
