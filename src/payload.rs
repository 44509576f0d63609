use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::base64::Base64;

/// 載荷驗證或序列化失敗時的錯誤。
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid payload: {0}")]
    Invalid(&'static str),
}

type Result<T> = std::result::Result<T, PayloadError>;

/// 定義所有 API 載荷必須實作的功能。
///
/// 實作者需提供自己的驗證邏輯；驗證在發送任何網路請求前執行。
pub trait PayloadT: Serialize {
    /// 驗證載荷資料是否符合預期的規範。
    fn validate(&self) -> Result<()>;

    /// 驗證後轉換為可簽名的 [`Payload`]。
    fn to_payload(&self) -> Result<Payload> {
        self.validate()?;
        Ok(Payload::Structured(serde_json::to_value(self)?))
    }
}

/// 傳給簽名傳輸層的請求內容。
///
/// `Raw` 原樣送出（空字串即 POST-as-GET），`Structured` 會先序列化為 JSON。
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(String),
    Structured(Value),
}

impl Payload {
    /// POST-as-GET：以空字串作為載荷。
    pub fn post_as_get() -> Self {
        Payload::Raw(String::new())
    }

    /// 將載荷序列化後以 Base64 封裝。
    pub fn to_base64(&self) -> Result<Base64> {
        match self {
            Payload::Raw(raw) => Ok(Base64::new(raw.as_bytes())),
            Payload::Structured(value) => Ok(Base64::new(serde_json::to_vec(value)?)),
        }
    }
}

/// 建立新帳號的載荷。
#[derive(Debug, Serialize, Deserialize)]
pub struct NewAccountPayload {
    contact: Vec<String>,
    #[serde(rename = "termsOfServiceAgreed")]
    terms_of_service_agreed: bool,
}

impl NewAccountPayload {
    /// 建立一個新的 `NewAccountPayload` 實例。
    ///
    /// 每個聯絡信箱都會補上 `mailto:` 前綴，若已包含則不重複補充。
    pub fn new<S: AsRef<str>>(emails: &[S], terms_of_service_agreed: bool) -> Self {
        let contact = emails
            .iter()
            .map(|email| {
                let email = email.as_ref();
                if email.starts_with("mailto:") {
                    email.to_string()
                } else {
                    format!("mailto:{}", email)
                }
            })
            .collect();

        NewAccountPayload {
            contact,
            terms_of_service_agreed,
        }
    }

    pub fn contact(&self) -> &[String] {
        &self.contact
    }
}

impl PayloadT for NewAccountPayload {
    /// 服務條款旗標原樣送出，是否接受由 CA 決定。
    fn validate(&self) -> Result<()> {
        if self.contact.iter().any(|c| c == "mailto:") {
            return Err(PayloadError::Invalid("Contact email must not be empty"));
        }
        Ok(())
    }
}

/// 表示一個識別項，用來描述證書所涵蓋的主機名稱。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl Identifier {
    /// 建立 `dns` 類型的識別項。
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            type_: "dns".to_string(),
            value: value.into(),
        }
    }
}

/// 建立新訂單時的載荷。
#[derive(Debug, Serialize, Deserialize)]
pub struct NewOrderPayload {
    pub identifiers: Vec<Identifier>,
}

impl NewOrderPayload {
    pub fn new(identifiers: &[Identifier]) -> Self {
        NewOrderPayload {
            identifiers: identifiers.to_vec(),
        }
    }
}

impl PayloadT for NewOrderPayload {
    /// 必須至少包含一個識別項，所有識別項的類型必須為 `"dns"` 且值不得為空。
    fn validate(&self) -> Result<()> {
        if self.identifiers.is_empty() {
            return Err(PayloadError::Invalid("At least one identifier is required"));
        }
        for identifier in &self.identifiers {
            if identifier.type_ != "dns" {
                return Err(PayloadError::Invalid("Identifier type must be 'dns'"));
            }
            if identifier.value.is_empty() {
                return Err(PayloadError::Invalid("Identifier value cannot be empty"));
            }
        }
        Ok(())
    }
}

/// 通知 CA 挑戰已就緒，內容固定為空物件 `{}`。
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ChallengeReadyPayload {}

impl PayloadT for ChallengeReadyPayload {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// 最終化訂單時的載荷，包含 URL 安全編碼的 DER 格式 CSR。
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeOrderPayload {
    #[serde(rename = "csr")]
    csr_b64_str: String,
}

impl FinalizeOrderPayload {
    pub fn new(csr_b64: &Base64) -> Self {
        FinalizeOrderPayload {
            csr_b64_str: csr_b64.base64_url(),
        }
    }
}

impl PayloadT for FinalizeOrderPayload {
    fn validate(&self) -> Result<()> {
        if self.csr_b64_str.is_empty() {
            return Err(PayloadError::Invalid("CSR cannot be empty"));
        }
        Ok(())
    }
}
