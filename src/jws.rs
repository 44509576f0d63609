//! 此模組提供 ACME 請求使用的 JSON Web Signature（扁平化 JSON 序列化）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    key_pair::KeyPair,
    payload::{Payload, PayloadError},
    protection::{KeyBinding, ProtectedHeader, ProtectionError},
    signature::{create_signature, SignatureError},
};

/// 表示與 JWS 相關的錯誤。
#[derive(Error, Debug)]
pub enum JwsError {
    #[error("Protection error: {0}")]
    Protection(#[from] ProtectionError),
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, JwsError>;

/// 一個已簽名的 JWS 物件，三個欄位皆為 URL 安全 Base64 字串。
#[derive(Serialize, Deserialize, Debug)]
pub struct Jws {
    #[serde(rename = "protected")]
    header: String,
    payload: String,
    signature: String,
}

impl Jws {
    /// 為指定的 URL 與 nonce 簽署載荷。
    ///
    /// # 參數
    ///
    /// - `key_pair`: 帳戶金鑰。
    /// - `binding`: 嵌入 JWK 或使用 `kid`。
    /// - `nonce`: 本次請求使用的 Replay-Nonce。
    /// - `url`: 請求目標，必須與實際 POST 的 URL 相同。
    /// - `payload`: 請求內容。
    pub fn sign(
        key_pair: &KeyPair,
        binding: KeyBinding<'_>,
        nonce: &str,
        url: &str,
        payload: &Payload,
    ) -> Result<Self> {
        let header_b64 = ProtectedHeader::new(key_pair, binding, nonce, url)?.to_base64()?;
        let payload_b64 = payload.to_base64()?;
        let signature_b64 = create_signature(&header_b64, &payload_b64, key_pair)?;

        Ok(Jws {
            header: header_b64.base64_url(),
            payload: payload_b64.base64_url(),
            signature: signature_b64.base64_url(),
        })
    }

    /// 將 `Jws` 實例序列化為 JSON 字串，作為 `application/jose+json` 請求主體。
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn protected(&self) -> &str {
        &self.header
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}
