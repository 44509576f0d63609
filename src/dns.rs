//! DNS 記錄的外部協作介面。
//!
//! 本庫不實作任何 DNS 服務商，呼叫端以 [`DnsProvider`] 接上自己的後端。
//! [`MemoryDns`] 是記憶體內的實作，適合測試或搭配自建的驗證伺服器。

use std::{collections::BTreeMap, fmt::Debug, sync::Mutex};

use thiserror::Error;
use tracing::debug;

/// DNS 操作錯誤。
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS provider error: {0}")]
    Provider(String),
    #[error("Unsupported record type: {0}")]
    UnsupportedRecordType(String),
    #[error("DNS record store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, DnsError>;

/// DNS 記錄的新增與刪除。
///
/// 實作必須可在多個執行緒間共用，驗證流程會同時為多個授權發布記錄。
pub trait DnsProvider: Send + Sync + Debug {
    /// 新增一筆記錄；記錄已存在時視為成功。
    fn add_record(&self, record_type: &str, name: &str, value: &str) -> Result<()>;

    /// 刪除名稱與值都相符的記錄；找不到時視為成功。
    fn delete_record(&self, record_type: &str, name: &str, value: &str) -> Result<()>;
}

/// 記憶體內的 TXT 記錄表。
///
/// 同一名稱可以有多個值，例如 `example.test` 與 `*.example.test`
/// 都會發布到 `_acme-challenge.example.test`。
#[derive(Debug, Default)]
pub struct MemoryDns {
    records: Mutex<BTreeMap<String, Vec<String>>>,
}

impl MemoryDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// 回傳某名稱下的所有值。
    pub fn values(&self, name: &str) -> Vec<String> {
        self.records
            .lock()
            .map(|records| records.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.values(name).iter().any(|v| v == value)
    }

    /// 目前記錄的總筆數。
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .map(|records| records.values().map(Vec::len).sum())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_type(record_type: &str) -> Result<()> {
        if record_type.eq_ignore_ascii_case("TXT") {
            Ok(())
        } else {
            Err(DnsError::UnsupportedRecordType(record_type.to_string()))
        }
    }
}

impl DnsProvider for MemoryDns {
    fn add_record(&self, record_type: &str, name: &str, value: &str) -> Result<()> {
        Self::check_type(record_type)?;
        let mut records = self.records.lock().map_err(|_| DnsError::LockPoisoned)?;

        let values = records.entry(name.to_string()).or_default();
        if values.iter().any(|v| v == value) {
            debug!(record = name, "record already present");
        } else {
            values.push(value.to_string());
        }
        Ok(())
    }

    fn delete_record(&self, record_type: &str, name: &str, value: &str) -> Result<()> {
        Self::check_type(record_type)?;
        let mut records = self.records.lock().map_err(|_| DnsError::LockPoisoned)?;

        if let Some(values) = records.get_mut(name) {
            values.retain(|v| v != value);
            if values.is_empty() {
                records.remove(name);
            }
        }
        Ok(())
    }
}
