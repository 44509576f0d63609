use serde::Serialize;
use thiserror::Error;

use crate::{
    base64::Base64,
    jwk::Jwk,
    key_pair::{KeyError, KeyPair},
    signature::{jws_algorithm, SignatureError},
};

/// 定義保護標頭產生過程中可能產生的錯誤類型。
#[derive(Debug, Error)]
pub enum ProtectionError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

type Result<T> = std::result::Result<T, ProtectionError>;

/// 請求如何向 CA 表明簽名者身分。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBinding<'a> {
    /// 嵌入公鑰 JWK，僅用於註冊帳戶等尚未取得帳戶 URL 的請求。
    Jwk,
    /// 以帳戶 URL 作為 `kid`。
    Kid(&'a str),
}

/// JWS 保護標頭。
///
/// `jwk` 與 `kid` 互斥：依 [`KeyBinding`] 只會出現其中一個。
#[derive(Debug, Serialize)]
pub struct ProtectedHeader {
    alg: &'static str,
    nonce: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

impl ProtectedHeader {
    /// 根據金鑰、nonce、目標 URL 與身分綁定方式建立保護標頭。
    pub fn new(
        key_pair: &KeyPair,
        binding: KeyBinding<'_>,
        nonce: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self> {
        let (jwk, kid) = match binding {
            KeyBinding::Jwk => (Some(key_pair.jwk()?), None),
            KeyBinding::Kid(kid) => (None, Some(kid.to_string())),
        };

        Ok(ProtectedHeader {
            alg: jws_algorithm(key_pair)?,
            nonce: nonce.into(),
            url: url.into(),
            jwk,
            kid,
        })
    }

    /// 序列化後轉換為 Base64。
    pub fn to_base64(&self) -> Result<Base64> {
        Ok(Base64::new(serde_json::to_vec(self)?))
    }
}
