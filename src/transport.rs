//! 簽名傳輸層：所有需要驗證身分的 ACME 請求都經過這裡。
//!
//! 每個請求都會以帳戶金鑰簽署成 JWS，並使用會話目前的 Replay-Nonce。
//! 同一會話的請求由互斥鎖序列化，nonce 的讀取、使用與更新不會交錯。

use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    directory::Directory,
    http::{HttpClientT, HttpError, HttpResponse},
    jws::{Jws, JwsError},
    key_pair::KeyPair,
    nonce::{NonceCell, NonceError},
    payload::Payload,
    protection::KeyBinding,
};

/// 傳輸層錯誤。
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
    #[error("Nonce error: {0}")]
    Nonce(#[from] NonceError),
    #[error("JWS error: {0}")]
    Jws(#[from] JwsError),
    #[error("Nonce lock poisoned")]
    LockPoisoned,
    /// CA 以 4xx/5xx 拒絕請求，附帶問題文件的類型與說明。
    #[error("{problem} (HTTP {status})")]
    Rejected { status: StatusCode, problem: Problem },
}

impl TransportError {
    /// 若為 CA 拒絕，回傳其問題文件。
    pub fn problem(&self) -> Option<&Problem> {
        match self {
            TransportError::Rejected { problem, .. } => Some(problem),
            _ => None,
        }
    }
}

type Result<T> = std::result::Result<T, TransportError>;

/// RFC 7807 問題文件（ACME 錯誤回應）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub problem_type: String,
    #[serde(default)]
    pub detail: String,
}

impl Problem {
    /// 解析回應主體；無法解析時回傳空的問題文件。
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// 類型以 `badNonce` 結尾即視為 nonce 過期。
    pub fn is_bad_nonce(&self) -> bool {
        self.problem_type.ends_with("badNonce")
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.problem_type, self.detail)
    }
}

/// 簽名傳輸層。
///
/// 不可變的部分（HTTP 客戶端與目錄）以 `Arc` 共享，
/// nonce 則是每個實例各自擁有的可變狀態，見 [`Transport::fork`]。
#[derive(Debug)]
pub struct Transport {
    http: Arc<dyn HttpClientT>,
    directory: Arc<Directory>,
    nonce: Mutex<NonceCell>,
}

impl Transport {
    pub fn new(http: Arc<dyn HttpClientT>, directory: Arc<Directory>) -> Self {
        Self {
            http,
            directory,
            nonce: Mutex::new(NonceCell::new()),
        }
    }

    /// 共用同一個 HTTP 客戶端與目錄，但以空的 nonce 重新開始。
    pub fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.http), Arc::clone(&self.directory))
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// 簽署並發送一個 ACME POST 請求。
    ///
    /// - 每個回應的 `Replay-Nonce` 都會更新會話狀態，不論成功與否。
    /// - 若 CA 回傳 `400` 且問題類型為 `badNonce`，以新的 nonce 重新簽名並只重送一次。
    /// - 重試後仍為 4xx/5xx 時回傳 [`TransportError::Rejected`]。
    ///
    /// # 參數
    ///
    /// - `key_pair`: 帳戶金鑰。
    /// - `binding`: 嵌入 JWK 或使用帳戶 URL 作為 `kid`。
    /// - `url`: 請求目標。
    /// - `payload`: 請求內容；POST-as-GET 請使用 [`Payload::post_as_get`]。
    pub fn post(
        &self,
        key_pair: &KeyPair,
        binding: KeyBinding<'_>,
        url: &str,
        payload: &Payload,
    ) -> Result<HttpResponse> {
        let mut nonce = self
            .nonce
            .lock()
            .map_err(|_| TransportError::LockPoisoned)?;

        let mut response = self.sign_and_send(&mut nonce, key_pair, binding, url, payload)?;

        if response.status == StatusCode::BAD_REQUEST
            && Problem::from_body(&response.body).is_bad_nonce()
        {
            debug!(url, "nonce rejected, retrying once with a fresh nonce");
            response = self.sign_and_send(&mut nonce, key_pair, binding, url, payload)?;
        }

        if response.status.is_client_error() || response.status.is_server_error() {
            let problem = Problem::from_body(&response.body);
            warn!(url, status = %response.status, problem = %problem, "ACME request rejected");
            return Err(TransportError::Rejected {
                status: response.status,
                problem,
            });
        }

        Ok(response)
    }

    fn sign_and_send(
        &self,
        nonce: &mut NonceCell,
        key_pair: &KeyPair,
        binding: KeyBinding<'_>,
        url: &str,
        payload: &Payload,
    ) -> Result<HttpResponse> {
        let current = nonce.take_or_fetch(self.http.as_ref(), &self.directory.new_nonce)?;
        let body = Jws::sign(key_pair, binding, &current, url, payload)?.to_json()?;

        let response = self.http.post_jose(url, body)?;
        nonce.observe(&response);
        debug!(url, status = %response.status, "ACME request completed");

        Ok(response)
    }
}
