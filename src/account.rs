//! 模組提供 ACME 帳戶的建立、匯入與註冊。

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    key_pair::{KeyAlgorithm, KeyError, KeyPair},
    payload::{NewAccountPayload, PayloadError, PayloadT},
    protection::KeyBinding,
    transport::{Transport, TransportError},
};

/// 處理 ACME 帳戶相關操作時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Key error: {0}")]
    KeyError(#[from] KeyError),
    #[error("Payload error: {0}")]
    PayloadError(#[from] PayloadError),
    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),
    #[error("Account key must be a P-256 EC key")]
    NotAnEcKey,
    #[error("Account credentials carry no private key")]
    MissingPrivateKey,
    #[error("Account URL missing from credentials")]
    MissingAccountUrl,
    #[error("Location header not found in new-account response")]
    MissingLocation,
}

pub type Result<T> = std::result::Result<T, AccountError>;

/// 呼叫端持有的帳戶資料，可自行序列化保存，之後再以
/// [`Client::adopt_account`](crate::client::Client::adopt_account) 匯入。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCredentials {
    #[serde(default)]
    pub contact: Vec<String>,
    #[serde(default)]
    pub tos_agreed: bool,
    #[serde(default)]
    pub account_url: String,
    /// SEC1 或 PKCS#8 PEM 格式的帳戶私鑰。
    pub private_key_pem: Option<String>,
}

/// ACME 帳戶。私鑰只存在於行程內，不會送出。
#[derive(Debug, Clone)]
pub struct Account {
    /// 聯絡信箱（不含 `mailto:` 前綴）。
    pub contact: Vec<String>,
    /// 是否同意服務條款。
    pub tos_agreed: bool,
    /// CA 回傳的帳戶 URL，作為後續請求的 `kid`。
    pub account_url: String,
    /// 帳戶使用的 P-256 金鑰對。
    pub key_pair: KeyPair,
}

impl Account {
    /// 匯入呼叫端提供的帳戶資料，不與 CA 通訊。
    ///
    /// # Errors
    ///
    /// 私鑰缺失、PEM 格式錯誤或金鑰不是 P-256 時回傳錯誤。
    pub fn from_credentials(credentials: &AccountCredentials) -> Result<Self> {
        let pem = credentials
            .private_key_pem
            .as_deref()
            .ok_or(AccountError::MissingPrivateKey)?;
        if credentials.account_url.is_empty() {
            return Err(AccountError::MissingAccountUrl);
        }

        Ok(Account {
            contact: credentials.contact.clone(),
            tos_agreed: credentials.tos_agreed,
            account_url: credentials.account_url.clone(),
            key_pair: Self::import_key(pem)?,
        })
    }

    /// 向 CA 註冊帳戶並取得帳戶 URL。
    ///
    /// 未提供金鑰時會產生新的 P-256 金鑰；註冊請求嵌入 JWK 而非 `kid`。
    ///
    /// # Arguments
    ///
    /// * `transport` - 會話的簽名傳輸層。
    /// * `contact` - 聯絡信箱。
    /// * `tos_agreed` - 是否同意服務條款。
    /// * `key_pair` - 既有的帳戶金鑰，`None` 表示產生新金鑰。
    ///
    /// # Errors
    ///
    /// 本地檢查失敗時不發送請求；CA 拒絕時回傳 [`AccountError::TransportError`]。
    pub fn register(
        transport: &Transport,
        contact: Vec<String>,
        tos_agreed: bool,
        key_pair: Option<KeyPair>,
    ) -> Result<Self> {
        let payload = NewAccountPayload::new(&contact, tos_agreed).to_payload()?;
        let key_pair = match key_pair {
            Some(key_pair) if key_pair.alg != KeyAlgorithm::EcP256 => {
                return Err(AccountError::NotAnEcKey)
            }
            Some(key_pair) => key_pair,
            None => KeyPair::generate_ec()?,
        };

        let new_account_url = transport.directory().new_account.clone();
        let response = transport.post(&key_pair, KeyBinding::Jwk, &new_account_url, &payload)?;

        let account_url = response
            .header("Location")
            .filter(|url| !url.is_empty())
            .ok_or(AccountError::MissingLocation)?
            .to_string();
        info!(account_url = %account_url, "ACME account registered");

        Ok(Account {
            contact,
            tos_agreed,
            account_url,
            key_pair,
        })
    }

    /// 解析 PEM 私鑰，並確認是 P-256 帳戶金鑰。
    pub fn import_key(pem: &str) -> Result<KeyPair> {
        let key_pair = KeyPair::from_pem(pem.as_bytes())?;
        if key_pair.alg != KeyAlgorithm::EcP256 {
            return Err(AccountError::NotAnEcKey);
        }
        Ok(key_pair)
    }

    /// 帳戶金鑰的 JWK thumbprint，用於計算 DNS-01 驗證值。
    pub fn thumbprint(&self) -> Result<String> {
        Ok(self.key_pair.thumbprint()?)
    }

    /// 匯出為可保存的帳戶資料。
    pub fn credentials(&self) -> Result<AccountCredentials> {
        Ok(AccountCredentials {
            contact: self.contact.clone(),
            tos_agreed: self.tos_agreed,
            account_url: self.account_url.clone(),
            private_key_pem: Some(self.key_pair.to_pem()?),
        })
    }
}
