use std::fmt;

use reqwest::{
    blocking::Client,
    header::{HeaderMap, CONTENT_TYPE},
    StatusCode,
};
use thiserror::Error;

/// HTTP 層的錯誤。
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

type Result<T> = std::result::Result<T, HttpError>;

/// ACME 請求的內容類型。
pub const JOSE_CONTENT_TYPE: &str = "application/jose+json";

/// 已完整讀取主體的 HTTP 回應。
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 取得單一標頭值；不存在或不是有效字串時回傳 `None`。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 取得同名標頭的所有值，例如多個 `Link`。
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// 與 CA 溝通所需的最小 HTTP 能力。
///
/// 正式環境使用 [`ReqwestClient`]；測試可以換成不經網路的實作。
pub trait HttpClientT: Send + Sync + fmt::Debug {
    /// 發送 GET 請求，例如讀取目錄。
    fn get(&self, url: &str) -> Result<HttpResponse>;

    /// 發送 HEAD 請求，例如從 `newNonce` 取得 nonce。
    fn head(&self, url: &str) -> Result<HttpResponse>;

    /// 以 `application/jose+json` 發送已簽名的 JWS。
    fn post_jose(&self, url: &str, body: String) -> Result<HttpResponse>;
}

/// 以 `reqwest` 阻塞式客戶端實作的 [`HttpClientT`]。
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(response: reqwest::blocking::Response) -> Result<HttpResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpClientT for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        Self::read(self.client.get(url).send()?)
    }

    fn head(&self, url: &str) -> Result<HttpResponse> {
        Self::read(self.client.head(url).send()?)
    }

    fn post_jose(&self, url: &str, body: String) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JOSE_CONTENT_TYPE)
            .body(body)
            .send()?;
        Self::read(response)
    }
}
