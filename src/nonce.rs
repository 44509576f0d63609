use thiserror::Error;
use tracing::debug;

use crate::http::{HttpClientT, HttpError, HttpResponse};

/// 回應中攜帶新 nonce 的標頭名稱。
pub const REPLAY_NONCE: &str = "Replay-Nonce";

/// 表示在取得 Nonce 時可能發生的錯誤狀況。
#[derive(Error, Debug)]
pub enum NonceError {
    #[error("Failed to make request: {0}")]
    RequestFailed(#[from] HttpError),
    #[error("No Replay-Nonce header found in response")]
    NoNonceHeader,
}

/// 會話內可變的 nonce 狀態。
///
/// nonce 只能使用一次：[`NonceCell::take_or_fetch`] 取出後即清空，
/// 直到下一個回應的 `Replay-Nonce` 透過 [`NonceCell::observe`] 補上。
/// 呼叫者必須在互斥鎖內操作此結構。
#[derive(Debug, Default)]
pub struct NonceCell {
    value: Option<String>,
}

impl NonceCell {
    /// 建立一個空的 nonce 狀態，第一次使用時會向 CA 取得新 nonce。
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出目前的 nonce；沒有時以 HEAD 請求 `new_nonce_url` 取得。
    pub fn take_or_fetch(
        &mut self,
        http: &dyn HttpClientT,
        new_nonce_url: &str,
    ) -> Result<String, NonceError> {
        if let Some(nonce) = self.value.take() {
            return Ok(nonce);
        }

        debug!(url = new_nonce_url, "fetching fresh nonce");
        let response = http.head(new_nonce_url)?;
        response
            .header(REPLAY_NONCE)
            .map(ToString::to_string)
            .ok_or(NonceError::NoNonceHeader)
    }

    /// 記錄回應帶回的 `Replay-Nonce`，不論回應成功或失敗。
    pub fn observe(&mut self, response: &HttpResponse) {
        if let Some(nonce) = response.header(REPLAY_NONCE).filter(|n| !n.is_empty()) {
            self.value = Some(nonce.to_string());
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
