use openssl::{ecdsa::EcdsaSig, error::ErrorStack, sha::sha256};
use thiserror::Error;

use crate::{
    base64::Base64,
    key_pair::{KeyAlgorithm, KeyPair},
};

/// 定義簽名操作可能遇到的錯誤類型。
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Signing error: {0}")]
    SigningError(#[from] ErrorStack),
    #[error("Unsupported algorithm: {0:?}")]
    UnsupportedAlgorithm(KeyAlgorithm),
}

/// ES256 簽名中 r 與 s 各自固定的長度。
const ES256_COORDINATE_LEN: i32 = 32;

/// 取得金鑰對應的 JWS `alg` 名稱。
pub fn jws_algorithm(key_pair: &KeyPair) -> Result<&'static str, SignatureError> {
    match key_pair.alg {
        KeyAlgorithm::EcP256 => Ok("ES256"),
        alg => Err(SignatureError::UnsupportedAlgorithm(alg)),
    }
}

/// 根據 header 與 payload 的 Base64 URL 編碼值產生 JWS 簽名。
///
/// ES256 的輸出是 `r || s` 的 64 位元組原始格式（RFC 7518 §3.4），
/// 而非 OpenSSL 預設的 DER 編碼。
///
/// # 參數
///
/// - `header_b64`: 已編碼的保護標頭。
/// - `payload_b64`: 已編碼的負載。
/// - `key_pair`: 帳戶金鑰。
pub fn create_signature(
    header_b64: &Base64,
    payload_b64: &Base64,
    key_pair: &KeyPair,
) -> Result<Base64, SignatureError> {
    let signing_input = format!("{}.{}", header_b64.base64_url(), payload_b64.base64_url());
    jws_algorithm(key_pair)?;

    let digest = sha256(signing_input.as_bytes());
    let ec_key = key_pair.pri_key.ec_key()?;
    let sig = EcdsaSig::sign(&digest, &ec_key)?;

    let mut raw = sig.r().to_vec_padded(ES256_COORDINATE_LEN)?;
    raw.extend(sig.s().to_vec_padded(ES256_COORDINATE_LEN)?);

    Ok(Base64::new(raw))
}
