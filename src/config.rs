use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::CertificateAuthority;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, ConfigError>;

/// 客戶端設定。
///
/// ```json
/// {
///   "ca": "letsencrypt_staging",
///   "directory_url": "https://localhost:14000/dir",
///   "root_ca_key_id": "1B:FB:1C:F0:31:7D:03:2B:DA:0A:9B:AF:78:A6:F6:99:91:19:9C:B2"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub ca: CertificateAuthority,
    /// 覆寫 CA 的目錄 URL，例如本地的 Pebble。
    #[serde(default)]
    pub directory_url: Option<String>,
    /// 只接受通往此根憑證的憑證鏈。
    #[serde(default)]
    pub root_ca_key_id: Option<String>,
}

impl ClientConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// 實際使用的目錄 URL。
    pub fn directory_url(&self) -> &str {
        self.directory_url
            .as_deref()
            .unwrap_or_else(|| self.ca.directory_url())
    }
}
