use std::result;

use openssl::{
    hash::MessageDigest,
    stack::Stack,
    x509::{extension::SubjectAlternativeName, X509NameBuilder, X509Req},
};
use thiserror::Error;

use crate::{
    key_pair::{KeyError, KeyPair},
    payload::Identifier,
};

/// 用於描述建立 CSR（證書簽名請求）過程中可能發生的錯誤。
#[derive(Debug, Error)]
pub enum CsrError {
    #[error("Openssl error: {0}")]
    OpensslError(#[from] openssl::error::ErrorStack),
    #[error("Key error: {0}")]
    KeyError(#[from] KeyError),
    #[error("No SAN entries")]
    NoSanEntries,
}

/// 為簡化錯誤處理定義 Result 類型
type Result<T> = result::Result<T, CsrError>;

/// CSR 建構器，產生帶有主體名稱與 DNS 主體替代名稱 (SAN) 的證書簽名請求。
///
/// # 範例
///
/// ```
/// use dns01_acme::{csr::CSR, key_pair::KeyPair};
///
/// let key_pair = KeyPair::generate_rsa(2048).unwrap();
/// let req = CSR::new()
///     .set_san("example.test")
///     .set_san("*.example.test")
///     .build(&key_pair)
///     .unwrap();
/// assert!(req.verify(&key_pair.pri_key).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct CSR {
    common_name: Option<String>,
    san_entries: Vec<String>,
}

impl CSR {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以識別項建立：第一個識別項作為 CN，全部作為 SAN。
    pub fn for_identifiers(identifiers: &[Identifier]) -> Self {
        identifiers
            .iter()
            .fold(Self::new(), |csr, identifier| csr.set_san(&identifier.value))
    }

    /// 設定主體 CN；未設定時使用第一個 SAN。
    pub fn set_common_name(mut self, common_name: &str) -> Self {
        self.common_name = Some(common_name.to_string());
        self
    }

    /// 新增一個 DNS 主體替代名稱 (SAN)。
    pub fn set_san(mut self, dns_name: &str) -> Self {
        self.san_entries.push(dns_name.to_string());
        self
    }

    /// 以 SHA-256 和指定金鑰簽署 CSR。
    ///
    /// # 錯誤
    ///
    /// 未設定任何 SAN 時回傳 `CsrError::NoSanEntries`，OpenSSL 失敗時回傳 `CsrError::OpensslError`。
    pub fn build(self, key_pair: &KeyPair) -> Result<X509Req> {
        let first = self.san_entries.first().ok_or(CsrError::NoSanEntries)?;
        let common_name = self.common_name.as_deref().unwrap_or(first);

        let mut req_builder = X509Req::builder()?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_text("CN", common_name)?;
        req_builder.set_subject_name(&name.build())?;

        let mut san_builder = SubjectAlternativeName::new();
        for entry in &self.san_entries {
            san_builder.dns(entry);
        }
        let san_extension = san_builder.build(&req_builder.x509v3_context(None))?;

        let mut stack = Stack::new()?;
        stack.push(san_extension)?;
        req_builder.add_extensions(&stack)?;

        req_builder.set_pubkey(&key_pair.pri_key)?;
        req_builder.sign(&key_pair.pri_key, MessageDigest::sha256())?;

        Ok(req_builder.build())
    }
}

/// 為一組識別項產生新的 RSA 憑證金鑰與 DER 格式的 CSR。
///
/// 憑證金鑰與帳戶金鑰無關，每次簽發都重新產生。
pub fn certificate_request(identifiers: &[Identifier]) -> Result<(Vec<u8>, KeyPair)> {
    let key_pair = KeyPair::generate_rsa(KeyPair::DEFAULT_RSA_BITS)?;
    let der = CSR::for_identifiers(identifiers).build(&key_pair)?.to_der()?;
    Ok((der, key_pair))
}
