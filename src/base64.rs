use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use thiserror::Error;

/// Base64 解碼時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid base64 data: {0}")]
    Invalid(#[from] base64::DecodeError),
}

/// 封裝一段原始位元組，並提供標準與 URL 安全兩種 Base64 表示。
///
/// ACME 協議中的 JWS 各部分、CSR 以及 DNS-01 驗證值都使用無填充的 URL 安全編碼，
/// 因此 [`Base64::base64_url`] 是最常用的輸出形式。
///
/// # 示例
///
/// ```
/// use dns01_acme::base64::Base64;
///
/// let b64 = Base64::new("Hello, World!");
/// assert_eq!(b64.as_str(), "SGVsbG8sIFdvcmxkIQ==");
/// assert_eq!(b64.base64_url(), "SGVsbG8sIFdvcmxkIQ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64 {
    bytes: Vec<u8>,
    encoded: String,
}

impl Base64 {
    /// 根據輸入資料建立 `Base64` 實例。
    pub fn new<T: AsRef<[u8]>>(input: T) -> Self {
        let bytes = input.as_ref().to_vec();
        let encoded = STANDARD.encode(&bytes);
        Self { bytes, encoded }
    }

    /// 從無填充的 URL 安全 Base64 字串還原。
    ///
    /// # 錯誤
    ///
    /// 字串含有非法字元或長度不正確時回傳 [`DecodeError`]。
    pub fn from_url(url_encoded: &str) -> Result<Self, DecodeError> {
        let bytes = URL_SAFE_NO_PAD.decode(url_encoded.trim_end_matches('='))?;
        Ok(Self::new(bytes))
    }

    /// 取得原始位元組。
    pub fn decode(&self) -> &[u8] {
        &self.bytes
    }

    /// 回傳 URL 安全、無填充的編碼字串。
    pub fn base64_url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.bytes)
    }

    /// 回傳標準 Base64 編碼字串。
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}
