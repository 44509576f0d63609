//! 憑證鏈的下載、解析與選擇。
//!
//! CA 可能同時提供多條有效的憑證鏈（透過 `Link: rel="alternate"`），
//! 各自通往不同的根憑證。這裡下載全部鏈，再依根憑證的金鑰識別碼挑選。

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use openssl::{
    asn1::{Asn1Time, Asn1TimeRef},
    nid::Nid,
    x509::X509,
};
use pem::{EncodeConfig, LineEnding};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    account::Account,
    link::Link,
    payload::Payload,
    protection::KeyBinding,
    transport::{Transport, TransportError},
};

/// 證書相關操作可能出現的錯誤類型
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Failed to parse certificate: {0}")]
    ParseError(#[from] openssl::error::ErrorStack),
    #[error("Invalid certificate timestamp")]
    InvalidTimestamp,
    #[error("CA returned no parsable certificate chain")]
    NoChains,
    #[error("No chain rooted at {wanted}, available: {available:?}")]
    NoMatchingChain {
        wanted: String,
        available: Vec<String>,
    },
}

/// 自定義結果型別，錯誤類型為 `CertificateError`
type Result<T> = std::result::Result<T, CertificateError>;

/// 將金鑰識別碼格式化為以冒號分隔的大寫十六進位字串。
///
/// ```
/// use dns01_acme::certificate::format_key_id;
///
/// assert_eq!(format_key_id(&[0x79, 0xb4, 0x05]), "79:B4:05");
/// assert_eq!(format_key_id(&[]), "");
/// ```
pub fn format_key_id(id: &[u8]) -> String {
    id.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// 一條已解析的憑證鏈：第一張為終端憑證，其餘為中繼憑證。
#[derive(Debug, Clone)]
pub struct CertificateChain {
    /// CA 回傳的原始內容。
    pub pem: String,
    blocks: Vec<String>,
    certs: Vec<X509>,
}

impl CertificateChain {
    /// 解析 PEM 內容；非 `CERTIFICATE` 或無法解析為 X.509 的區塊會被略過。
    ///
    /// 沒有任何可用憑證時回傳 `None`。
    pub fn parse(text: &str) -> Option<Self> {
        let (blocks, certs) = pem::parse_many(text)
            .ok()?
            .into_iter()
            .filter(|block| block.tag() == "CERTIFICATE")
            .filter_map(|block| {
                let encoded = pem::encode_config(
                    &block,
                    EncodeConfig::new().set_line_ending(LineEnding::LF),
                );
                X509::from_der(block.contents())
                    .ok()
                    .map(|cert| (encoded, cert))
            })
            .unzip::<_, _, Vec<_>, Vec<_>>();

        if certs.is_empty() {
            return None;
        }

        Some(Self {
            pem: text.to_string(),
            blocks,
            certs,
        })
    }

    pub fn leaf(&self) -> &X509 {
        &self.certs[0]
    }

    pub fn certificates(&self) -> &[X509] {
        &self.certs
    }

    pub fn leaf_pem(&self) -> &str {
        &self.blocks[0]
    }

    /// 中繼憑證的 PEM，依 CA 回傳的順序串接。
    pub fn chain_pem(&self) -> String {
        self.blocks[1..].concat()
    }

    /// 最後一張憑證的授權金鑰識別碼，即此鏈所通往的根憑證。
    pub fn root_ca_key_id(&self) -> String {
        self.certs
            .last()
            .and_then(|cert| cert.authority_key_id())
            .map(|id| format_key_id(id.as_slice()))
            .unwrap_or_default()
    }

    /// 整理成回傳給呼叫端的結果。
    pub fn to_bundle(&self, private_key_pem: String) -> Result<CertificateBundle> {
        let leaf = self.leaf();
        Ok(CertificateBundle {
            signature_algorithm: signature_algorithm_name(leaf),
            not_before: rfc3339(leaf.not_before())?,
            not_after: rfc3339(leaf.not_after())?,
            leaf_pem: self.leaf_pem().to_string(),
            chain_pem: self.chain_pem(),
            full_pem: self.pem.clone(),
            root_ca_key_id: self.root_ca_key_id(),
            private_key_pem,
        })
    }
}

/// 簽發完成後回傳給呼叫端的憑證資料。
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateBundle {
    pub signature_algorithm: String,
    /// UTC，RFC 3339 格式。
    pub not_before: String,
    pub not_after: String,
    pub leaf_pem: String,
    pub chain_pem: String,
    /// 終端憑證加中繼憑證，保留 CA 回傳的原樣。
    pub full_pem: String,
    pub root_ca_key_id: String,
    /// 憑證專用的 RSA 私鑰（PKCS#1 PEM）。
    pub private_key_pem: String,
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("signature_algorithm", &self.signature_algorithm)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("root_ca_key_id", &self.root_ca_key_id)
            .field("private_key_pem", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// 從候選鏈中挑出第一條符合根憑證識別碼的鏈；未指定時直接取第一條。
pub fn select_chain(
    chains: Vec<CertificateChain>,
    wanted: Option<&str>,
) -> Result<CertificateChain> {
    if chains.is_empty() {
        return Err(CertificateError::NoChains);
    }

    let wanted = match wanted.filter(|w| !w.is_empty()) {
        Some(wanted) => wanted,
        None => return chains.into_iter().next().ok_or(CertificateError::NoChains),
    };

    let available: Vec<String> = chains.iter().map(CertificateChain::root_ca_key_id).collect();
    chains
        .into_iter()
        .find(|chain| chain.root_ca_key_id().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| CertificateError::NoMatchingChain {
            wanted: wanted.to_string(),
            available,
        })
}

/// 下載憑證及所有 `rel="alternate"` 的替代鏈。
///
/// 替代鏈下載失敗時只記錄並略過；主要憑證下載失敗則回傳錯誤。
pub fn download_chains(
    transport: &Transport,
    account: &Account,
    certificate_url: &str,
) -> Result<Vec<String>> {
    let fetch = |url: &str| {
        transport.post(
            &account.key_pair,
            KeyBinding::Kid(&account.account_url),
            url,
            &Payload::post_as_get(),
        )
    };

    let response = fetch(certificate_url)?;
    let mut bundles = vec![response.text()];

    let links = Link::parse_all(response.header_values("Link"));
    for link in links.iter().filter(|link| link.is_alternate()) {
        match fetch(&link.url) {
            Ok(alternate) => bundles.push(alternate.text()),
            Err(e) => warn!(url = %link.url, error = %e, "skipping alternate chain"),
        }
    }

    debug!(count = bundles.len(), "downloaded certificate chains");
    Ok(bundles)
}

/// 下載、解析並選擇憑證鏈，回傳最終的 [`CertificateBundle`]。
pub fn retrieve(
    transport: &Transport,
    account: &Account,
    certificate_url: &str,
    root_ca_key_id: Option<&str>,
    private_key_pem: String,
) -> Result<CertificateBundle> {
    let chains: Vec<CertificateChain> = download_chains(transport, account, certificate_url)?
        .iter()
        .filter_map(|pem| CertificateChain::parse(pem))
        .collect();

    let chain = select_chain(chains, root_ca_key_id)?;
    info!(root_ca_key_id = %chain.root_ca_key_id(), "certificate chain selected");

    chain.to_bundle(private_key_pem)
}

/// 將 ASN.1 時間轉為 UTC 的 RFC 3339 字串。
fn rfc3339(time: &Asn1TimeRef) -> Result<String> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);

    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or(CertificateError::InvalidTimestamp)
}

/// 以常見的寫法命名簽章演算法，未知時使用 OpenSSL 的長名稱。
fn signature_algorithm_name(cert: &X509) -> String {
    let nid = cert.signature_algorithm().object().nid();
    let name = match nid {
        Nid::SHA1WITHRSAENCRYPTION => "SHA1-RSA",
        Nid::SHA256WITHRSAENCRYPTION => "SHA256-RSA",
        Nid::SHA384WITHRSAENCRYPTION => "SHA384-RSA",
        Nid::SHA512WITHRSAENCRYPTION => "SHA512-RSA",
        Nid::ECDSA_WITH_SHA1 => "ECDSA-SHA1",
        Nid::ECDSA_WITH_SHA256 => "ECDSA-SHA256",
        Nid::ECDSA_WITH_SHA384 => "ECDSA-SHA384",
        Nid::ECDSA_WITH_SHA512 => "ECDSA-SHA512",
        other => return other.long_name().unwrap_or("unknown").to_string(),
    };
    name.to_string()
}
