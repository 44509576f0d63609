//! 對外的主要介面：帳戶建立與 DNS-01 憑證簽發。

use std::{path::Path, sync::Arc};

use thiserror::Error;
use tracing::info;

use crate::{
    account::{Account, AccountCredentials, AccountError},
    certificate::{self, CertificateBundle, CertificateError},
    challenge::{ChallengeError, ChallengeResolver, PollPolicy},
    config::{ClientConfig, ConfigError},
    csr::{certificate_request, CsrError},
    directory::{CertificateAuthority, Directory, DirectoryError},
    dns::DnsProvider,
    http::{HttpClientT, ReqwestClient},
    key_pair::KeyError,
    order::{Order, OrderError},
    payload::Identifier,
    transport::Transport,
};

/// 客戶端操作可能產生的錯誤。
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Account error: {0}")]
    Account(#[from] AccountError),
    #[error("Order error: {0}")]
    Order(#[from] OrderError),
    #[error("Challenge error: {0}")]
    Challenge(#[from] ChallengeError),
    #[error("CSR error: {0}")]
    Csr(#[from] CsrError),
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("No account configured, create or adopt one first")]
    NoAccount,
    #[error("No DNS provider configured")]
    MissingDnsProvider,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// 一次簽發的請求內容。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignRequest {
    pub identifiers: Vec<Identifier>,
    /// 若指定，所有 TXT 記錄都發布到此名稱（CNAME 委派）。
    pub txt_cname: Option<String>,
}

impl SignRequest {
    /// 以 DNS 名稱建立請求，第一個名稱會成為憑證的 CN。
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: names.into_iter().map(Identifier::dns).collect(),
            txt_cname: None,
        }
    }

    pub fn txt_cname(mut self, cname: &str) -> Self {
        self.txt_cname = Some(cname.to_string());
        self
    }
}

/// 每次呼叫可覆寫的選項。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOptions {
    /// 只接受通往此根憑證的憑證鏈，格式見 [`certificate::format_key_id`]。
    pub root_ca_key_id: Option<String>,
}

impl SignOptions {
    pub fn root_ca_key_id(mut self, id: &str) -> Self {
        self.root_ca_key_id = Some(id.to_string());
        self
    }
}

/// 客戶端各複本共用、不可變的部分。
#[derive(Debug)]
struct Shared {
    dns: Arc<dyn DnsProvider>,
    poll_policy: PollPolicy,
}

/// 連線到單一 CA 的 ACME 客戶端。
///
/// 以 [`ClientBuilder`] 建立。同一個客戶端上的請求會依序執行；
/// 需要同時簽發時，以 [`Client::with_options`] 取得擁有獨立 nonce 的複本。
#[derive(Debug)]
pub struct Client {
    shared: Arc<Shared>,
    transport: Transport,
    account: Option<Account>,
    options: SignOptions,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn directory(&self) -> &Directory {
        self.transport.directory()
    }

    /// 以新的 P-256 金鑰與電子郵件註冊帳戶。
    pub fn create_account_with_email(
        &mut self,
        email: &str,
        tos_agreed: bool,
    ) -> Result<&Account> {
        let account =
            Account::register(&self.transport, vec![email.to_string()], tos_agreed, None)?;
        Ok(&*self.account.insert(account))
    }

    /// 匯入已註冊的帳戶，不與 CA 通訊。
    pub fn adopt_account(&mut self, credentials: &AccountCredentials) -> Result<&Account> {
        let account = Account::from_credentials(credentials)?;
        info!(account_url = %account.account_url, "adopted existing account");
        Ok(&*self.account.insert(account))
    }

    /// 以呼叫端提供的私鑰註冊帳戶；未提供私鑰時產生新的金鑰。
    ///
    /// PEM 格式錯誤時不會發出任何請求。
    pub fn create_account_with_private_key(
        &mut self,
        credentials: &AccountCredentials,
    ) -> Result<&Account> {
        let key_pair = credentials
            .private_key_pem
            .as_deref()
            .map(Account::import_key)
            .transpose()?;

        let account = Account::register(
            &self.transport,
            credentials.contact.clone(),
            credentials.tos_agreed,
            key_pair,
        )?;
        Ok(&*self.account.insert(account))
    }

    /// 複製出一個套用了覆寫選項的客戶端。
    ///
    /// 複本共用 HTTP 客戶端、目錄與 DNS 設定，但 nonce 從空白開始。
    pub fn with_options(&self, options: &SignOptions) -> Client {
        Client {
            shared: Arc::clone(&self.shared),
            transport: self.transport.fork(),
            account: self.account.clone(),
            options: SignOptions {
                root_ca_key_id: options
                    .root_ca_key_id
                    .clone()
                    .or_else(|| self.options.root_ca_key_id.clone()),
            },
        }
    }

    /// 以 DNS-01 驗證簽發一張憑證。
    ///
    /// 流程：建立訂單、完成所有授權、以新的 RSA 金鑰產生 CSR、最終確認訂單、
    /// 下載並選擇憑證鏈。任何一個授權未通過都會中止整個簽發。
    ///
    /// # 參數
    ///
    /// - `request`: 識別項與可選的 TXT CNAME
    /// - `options`: 覆寫客戶端預設的選項
    pub fn sign_certificate_with_dns(
        &self,
        request: &SignRequest,
        options: &SignOptions,
    ) -> Result<CertificateBundle> {
        self.with_options(options).sign(request)
    }

    fn sign(&self, request: &SignRequest) -> Result<CertificateBundle> {
        let account = self.account.as_ref().ok_or(ClientError::NoAccount)?;

        let order = Order::new(&self.transport, account, &request.identifiers)?;

        ChallengeResolver::new(
            &self.transport,
            account,
            self.shared.dns.as_ref(),
            self.shared.poll_policy,
        )
        .resolve_all(&order.authorizations, request.txt_cname.as_deref())?;

        let (csr, key_pair) = certificate_request(&request.identifiers)?;
        let certificate_url = order.finalize(&self.transport, account, &csr)?;
        info!(certificate_url = %certificate_url, "order finalized");

        Ok(certificate::retrieve(
            &self.transport,
            account,
            &certificate_url,
            self.options.root_ca_key_id.as_deref(),
            key_pair.to_pem()?,
        )?)
    }
}

/// [`Client`] 的建構器。
///
/// # 範例
///
/// ```no_run
/// use std::sync::Arc;
///
/// use dns01_acme::{client::ClientBuilder, directory::CertificateAuthority, dns::MemoryDns};
///
/// let client = ClientBuilder::new()
///     .ca(CertificateAuthority::LetsEncryptStaging)
///     .dns_provider(Arc::new(MemoryDns::new()))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    ca: CertificateAuthority,
    directory_url: Option<String>,
    root_ca_key_id: Option<String>,
    poll_policy: PollPolicy,
    http_client: Option<Arc<dyn HttpClientT>>,
    dns_provider: Option<Arc<dyn DnsProvider>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 從設定檔內容建立。
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            ca: config.ca,
            directory_url: config.directory_url.clone(),
            root_ca_key_id: config.root_ca_key_id.clone(),
            ..Self::default()
        }
    }

    /// 讀取 JSON 設定檔後建立，格式見 [`ClientConfig`]。
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = ClientConfig::from_json_file(path)?;
        Ok(Self::from_config(&config))
    }

    pub fn ca(mut self, ca: CertificateAuthority) -> Self {
        self.ca = ca;
        self
    }

    /// 覆寫目錄 URL，優先於 [`ClientBuilder::ca`]。
    pub fn directory_url(mut self, url: &str) -> Self {
        self.directory_url = Some(url.to_string());
        self
    }

    pub fn root_ca_key_id(mut self, id: &str) -> Self {
        self.root_ca_key_id = Some(id.to_string());
        self
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClientT>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn dns_provider(mut self, provider: Arc<dyn DnsProvider>) -> Self {
        self.dns_provider = Some(provider);
        self
    }

    /// 讀取 CA 目錄並建立客戶端。
    pub fn build(self) -> Result<Client> {
        let dns = self.dns_provider.ok_or(ClientError::MissingDnsProvider)?;
        let http = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestClient::new()));

        let url = self
            .directory_url
            .unwrap_or_else(|| self.ca.directory_url().to_string());
        let directory = Directory::fetch(http.as_ref(), &url)?;

        Ok(Client {
            shared: Arc::new(Shared {
                dns,
                poll_policy: self.poll_policy,
            }),
            transport: Transport::new(http, Arc::new(directory)),
            account: None,
            options: SignOptions {
                root_ca_key_id: self.root_ca_key_id,
            },
        })
    }
}
