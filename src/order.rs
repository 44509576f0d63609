use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    account::Account,
    base64::Base64,
    payload::{FinalizeOrderPayload, Identifier, NewOrderPayload, PayloadError, PayloadT},
    protection::KeyBinding,
    transport::{Transport, TransportError},
};

/// 定義訂單操作可能產生的錯誤。
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("Serde JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("New order rejected, status: {0}")]
    NewOrderRejected(OrderStatus),
    #[error("Order status not valid after finalize: {0}")]
    OrderNotValid(OrderStatus),
    #[error("Order is valid but carries no certificate URL")]
    MissingCertificateUrl,
}

type Result<T> = std::result::Result<T, OrderError>;

/// 訂單狀態，依 RFC 8555 §7.1.6。
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 表示訂單資料。
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    /// 訂單當前狀態
    pub status: OrderStatus,
    /// 過期時間（RFC 3339 字串）
    pub expires: Option<String>,
    /// 證書涵蓋的識別項
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    /// 授權 URL 列表，每個識別項一個
    #[serde(default)]
    pub authorizations: Vec<String>,
    /// 最終確認 URL
    pub finalize: String,
    /// 憑證 URL（僅在有效時存在）
    pub certificate: Option<String>,
    /// 伺服器回傳的訂單 URL
    #[serde(skip)]
    pub order_url: Option<String>,
}

impl Order {
    /// 為一組識別項建立新訂單。
    ///
    /// 回應狀態只接受 `pending` 或 `ready`，其他狀態（例如 CA 直接否決識別項）視為失敗，不會重試。
    ///
    /// # 參數
    ///
    /// - `transport`: 會話的簽名傳輸層
    /// - `account`: 已註冊的帳戶，其 URL 作為 `kid`
    /// - `identifiers`: 要申請的識別項
    pub fn new(
        transport: &Transport,
        account: &Account,
        identifiers: &[Identifier],
    ) -> Result<Self> {
        let payload = NewOrderPayload::new(identifiers).to_payload()?;
        let new_order_url = transport.directory().new_order.clone();

        let response = transport.post(
            &account.key_pair,
            KeyBinding::Kid(&account.account_url),
            &new_order_url,
            &payload,
        )?;

        let mut order: Self = serde_json::from_slice(&response.body)?;
        order.order_url = response.header("Location").map(ToString::to_string);

        match order.status {
            OrderStatus::Pending | OrderStatus::Ready => {
                info!(
                    order_url = order.order_url.as_deref().unwrap_or_default(),
                    status = %order.status,
                    authorizations = order.authorizations.len(),
                    "order opened"
                );
                Ok(order)
            }
            status => Err(OrderError::NewOrderRejected(status)),
        }
    }

    /// 提交 DER 格式的 CSR 以最終確認訂單。
    ///
    /// CA 在所有授權有效後應同步完成簽發，因此只有 `valid` 視為成功，這裡不做輪詢。
    /// 成功時回傳憑證 URL。
    pub fn finalize(
        &self,
        transport: &Transport,
        account: &Account,
        csr_der: &[u8],
    ) -> Result<String> {
        let payload = FinalizeOrderPayload::new(&Base64::new(csr_der)).to_payload()?;

        let response = transport.post(
            &account.key_pair,
            KeyBinding::Kid(&account.account_url),
            &self.finalize,
            &payload,
        )?;

        let updated: OrderUpdateResponse = serde_json::from_slice(&response.body)?;
        if updated.status != OrderStatus::Valid {
            return Err(OrderError::OrderNotValid(updated.status));
        }

        updated.certificate.ok_or(OrderError::MissingCertificateUrl)
    }
}

/// 用於解析 finalize 回傳資料的結構。
#[derive(Debug, Deserialize)]
struct OrderUpdateResponse {
    status: OrderStatus,
    certificate: Option<String>,
}
