use serde::{Deserialize, Serialize};

use crate::key_pair::sha256_base64_url;

/// JSON Web Key (JWK) 的封裝，目前僅支援 EC 格式。
///
/// 此列舉未來可以擴充以支援其他金鑰類型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    /// EC 格式的 JWK。
    #[serde(rename = "EC")]
    Ec(EcJwk),
}

/// EC 格式的 JWK，包含曲線名稱與公鑰座標。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcJwk {
    crv: String,
    x: String,
    y: String,
}

impl EcJwk {
    /// 以曲線名稱與已編碼的座標建立 `EcJwk`。
    pub fn new(crv: impl Into<String>, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            crv: crv.into(),
            x: x.into(),
            y: y.into(),
        }
    }

    pub fn crv(&self) -> &str {
        &self.crv
    }

    pub fn x(&self) -> &str {
        &self.x
    }

    pub fn y(&self) -> &str {
        &self.y
    }

    /// 產生 RFC 7638 要求的正規化 JSON：只含必要成員，依字典序排列且無空白。
    pub fn to_acme_json(&self) -> String {
        format!(
            r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
            self.crv, self.x, self.y
        )
    }
}

impl Jwk {
    /// 將 JWK 轉換為符合 ACME 協議要求的正規化 JSON。
    pub fn to_acme_json(&self) -> String {
        match self {
            Jwk::Ec(jwk) => jwk.to_acme_json(),
        }
    }

    /// 計算 JWK thumbprint（SHA-256，URL 安全 Base64）。
    pub fn thumbprint(&self) -> String {
        sha256_base64_url(self.to_acme_json().as_bytes())
    }
}
