use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::http::{HttpClientT, HttpError};

/// 表示處理目錄操作時可能發生的錯誤類型。
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Request error: {0}")]
    Request(#[from] HttpError),
    #[error("Directory request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Let's Encrypt 正式環境的 ISRG Root X1 金鑰識別碼。
pub const LETSENCRYPT_ROOT_KEY_ID_ISRG_ROOT_X1: &str =
    "79:B4:59:E6:7B:B6:E5:E4:01:73:80:08:88:C8:1A:58:F6:E9:9B:6E";
/// Let's Encrypt 正式環境（舊交叉簽章）的 DST Root CA X3 金鑰識別碼。
pub const LETSENCRYPT_ROOT_KEY_ID_DST_ROOT_CA_X3: &str =
    "C4:A7:B1:A4:7B:2C:71:FA:DB:E1:4B:90:75:FF:C4:15:60:85:89:10";
/// Let's Encrypt 測試環境的 Fake LE Root X1 金鑰識別碼。
pub const LETSENCRYPT_STAGING_ROOT_KEY_ID_FAKE_LE_ROOT_X1: &str =
    "C1:26:74:A4:8A:44:A0:E6:FA:20:28:D8:5C:23:9A:45:88:18:79:E0";
/// Let's Encrypt 測試環境的 Fake LE Root X2 金鑰識別碼。
pub const LETSENCRYPT_STAGING_ROOT_KEY_ID_FAKE_LE_ROOT_X2: &str =
    "1B:FB:1C:F0:31:7D:03:2B:DA:0A:9B:AF:78:A6:F6:99:91:19:9C:B2";

/// 已知的 CA。新增 CA 只需要在此加入一個目錄 URL。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CertificateAuthority {
    #[default]
    #[serde(rename = "letsencrypt")]
    LetsEncrypt,
    #[serde(rename = "letsencrypt_staging")]
    LetsEncryptStaging,
}

impl CertificateAuthority {
    /// 回傳 CA 的 ACME 目錄 URL。
    pub fn directory_url(&self) -> &'static str {
        match self {
            Self::LetsEncrypt => "https://acme-v02.api.letsencrypt.org/directory",
            Self::LetsEncryptStaging => "https://acme-staging-v02.api.letsencrypt.org/directory",
        }
    }
}

/// 目錄中 `meta` 欄位的內容。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMeta {
    pub terms_of_service: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub caa_identities: Vec<String>,
}

/// CA 目錄，列出各項操作的 API 路徑。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    /// 用於新帳號註冊的 API 路徑。
    pub new_account: String,
    /// 用於取得新的 nonce 值的 API 路徑。
    pub new_nonce: String,
    /// 用於建立訂單的 API 路徑。
    pub new_order: String,
    pub revoke_cert: Option<String>,
    pub key_change: Option<String>,
    pub meta: Option<DirectoryMeta>,
}

impl Directory {
    /// 從指定 URL 讀取目錄。
    ///
    /// # 錯誤
    ///
    /// 請求失敗、回應狀態非 2xx 或 JSON 格式錯誤時回傳 [`DirectoryError`]。
    pub fn fetch(http: &dyn HttpClientT, url: &str) -> DirectoryResult<Self> {
        debug!(url, "fetching ACME directory");
        let response = http.get(url)?;

        if !response.status.is_success() {
            return Err(DirectoryError::Status {
                status: response.status,
                body: response.text(),
            });
        }

        Ok(serde_json::from_slice(&response.body)?)
    }
}
