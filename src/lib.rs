//! # DNS-01 ACME 客戶端
//!
//! 以 RFC 8555 協議向 ACME CA（例如 Let's Encrypt）申請憑證，只使用 DNS-01 驗證，
//! 因此支援萬用字元網域。
//!
//! ## 模組概覽
//!
//! - **client**: 對外的主要介面，負責帳戶建立與整個簽發流程。
//! - **transport**: 簽署 JWS 請求並管理 `Replay-Nonce`，遇到 `badNonce` 自動重試一次。
//! - **account** / **order** / **challenge** / **certificate**: 對應 ACME 的各個資源。
//! - **dns**: [`dns::DnsProvider`] 介面，由呼叫端實作以發布 TXT 記錄。
//! - **key_pair** / **jwk** / **jws** / **signature**: 金鑰與簽章。
//!
//! ## 特性
//!
//! - 同一訂單的多個授權並行驗證，不論結果如何都會清除 TXT 記錄
//! - 支援以 CNAME 委派的 TXT 記錄名稱
//! - 下載 CA 提供的所有備用憑證鏈，依根憑證金鑰識別碼挑選
//! - 帳戶資料可序列化後再匯入
//!
//! ## 示例
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dns01_acme::{
//!     directory::CertificateAuthority, dns::MemoryDns, ClientBuilder, SignOptions, SignRequest,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = ClientBuilder::new()
//!         .ca(CertificateAuthority::LetsEncryptStaging)
//!         .dns_provider(Arc::new(MemoryDns::new()))
//!         .build()?;
//!
//!     client.create_account_with_email("admin@example.com", true)?;
//!
//!     let bundle = client.sign_certificate_with_dns(
//!         &SignRequest::new(["example.com", "*.example.com"]),
//!         &SignOptions::default(),
//!     )?;
//!     println!("{}", bundle.full_pem);
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod base64;
pub mod certificate;
pub mod challenge;
pub mod client;
pub mod config;
pub mod csr;
pub mod directory;
pub mod dns;
pub mod http;
pub mod jwk;
pub mod jws;
pub mod key_pair;
pub mod link;
pub mod nonce;
pub mod order;
pub mod payload;
pub mod protection;
pub mod signature;
pub mod transport;

#[cfg(test)]
mod mock_ca;

pub use account::AccountCredentials;
pub use certificate::CertificateBundle;
pub use client::{Client, ClientBuilder, ClientError, SignOptions, SignRequest};
pub use dns::{DnsProvider, MemoryDns};
