//! 測試用的記憶體內 ACME CA，實作 [`HttpClientT`]，不經過網路。
//!
//! 會驗證每個請求的 nonce、URL 與 ES256 簽名，並以 openssl 真正簽發憑證。
//! 根憑證 A 與 B 共用同一把中繼金鑰，B 鏈是交叉簽章的中繼憑證，
//! 以 `Link: rel="alternate"` 提供。

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, MsbOption},
    ec::{EcGroup, EcKey},
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    nid::Nid,
    pkey::{HasPublic, PKey, PKeyRef, Private, Public},
    rand::rand_bytes,
    sha::sha256,
    x509::{
        extension::{
            AuthorityKeyIdentifier, BasicConstraints, SubjectAlternativeName,
            SubjectKeyIdentifier,
        },
        X509Builder, X509Name, X509NameBuilder, X509NameRef, X509Req, X509,
    },
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    base64::Base64,
    certificate::format_key_id,
    challenge::dns_txt_value,
    dns::MemoryDns,
    http::{HttpClientT, HttpError, HttpResponse},
    jwk::Jwk,
    nonce::REPLAY_NONCE,
    payload::Identifier,
};

const BASE: &str = "https://ca.test";
const EXPIRES: &str = "2030-01-01T00:00:00Z";

/// nonce 檢查方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum BadNonceMode {
    /// 只接受由 CA 發出且未使用過的 nonce。
    #[default]
    Strict,
    /// 只接受 badNonce 回應附帶的 nonce，因此每個請求都要重送一次。
    FirstUse,
    /// 永遠回傳 badNonce。
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alternate {
    None,
    Valid,
    Broken,
}

#[derive(Debug)]
struct Authority {
    cert: X509,
    key: PKey<Private>,
}

#[derive(Debug)]
struct MockAccount {
    contact: Vec<String>,
    thumbprint: String,
    key: PKey<Public>,
}

#[derive(Debug)]
struct MockOrder {
    identifiers: Vec<Identifier>,
    authorizations: Vec<usize>,
    status: String,
    chains: Option<(String, String)>,
}

#[derive(Debug)]
struct MockAuthorization {
    value: String,
    wildcard: bool,
    token: String,
    status: &'static str,
    /// 通知後的驗證結果，在剩餘的 pending 輪詢次數用完前不會公開。
    verdict: Option<(&'static str, u32)>,
}

#[derive(Debug)]
struct State {
    nonces: HashSet<String>,
    nonce_counter: u64,
    retry_nonces: HashSet<String>,
    heads: usize,
    posts: Vec<String>,
    accounts: Vec<MockAccount>,
    orders: Vec<MockOrder>,
    authorizations: Vec<MockAuthorization>,
}

impl State {
    fn issue_nonce(&mut self) -> String {
        self.nonce_counter += 1;
        let nonce = format!("nonce-{}", self.nonce_counter);
        self.nonces.insert(nonce.clone());
        nonce
    }
}

#[derive(Deserialize)]
struct JwsBody {
    protected: String,
    payload: String,
    signature: String,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
    nonce: String,
    url: String,
    jwk: Option<Jwk>,
    kid: Option<String>,
}

struct Reply {
    status: StatusCode,
    body: Vec<u8>,
    headers: Vec<(&'static str, String)>,
    retry: bool,
}

impl Reply {
    fn json(status: StatusCode, value: Value) -> Self {
        Self {
            status,
            body: value.to_string().into_bytes(),
            headers: vec![("Content-Type", "application/json".into())],
            retry: false,
        }
    }

    fn problem(status: StatusCode, kind: &str, detail: &str) -> Self {
        let body = json!({
            "type": format!("urn:ietf:params:acme:error:{}", kind),
            "detail": detail,
        });
        Self {
            status,
            body: body.to_string().into_bytes(),
            headers: vec![("Content-Type", "application/problem+json".into())],
            retry: false,
        }
    }

    fn pem(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.as_bytes().to_vec(),
            headers: vec![("Content-Type", "application/pem-certificate-chain".into())],
            retry: false,
        }
    }

    fn header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

#[derive(Debug)]
pub(crate) struct MockCa {
    state: Mutex<State>,
    root_a: Authority,
    root_b: Authority,
    intermediate: Authority,
    cross_signed: X509,
    bad_nonce_mode: BadNonceMode,
    new_order_status: String,
    dns: Option<Arc<MemoryDns>>,
    rejected: HashSet<String>,
    failing_challenges: bool,
    pending_polls: u32,
    txt_cname: Option<String>,
    alternate: Alternate,
}

impl MockCa {
    pub(crate) fn new() -> Self {
        let root_a = root("Mock Root A");
        let root_b = root("Mock Root B");
        let intermediate = intermediate("Mock Intermediate", &root_a);
        let cross_signed = build_cert(
            intermediate.cert.subject_name(),
            &*intermediate.key,
            Some(&root_b),
            &root_b.key,
            true,
            &[],
        );

        Self {
            state: Mutex::new(State {
                nonces: HashSet::new(),
                nonce_counter: 0,
                retry_nonces: HashSet::new(),
                heads: 0,
                posts: Vec::new(),
                accounts: Vec::new(),
                orders: Vec::new(),
                authorizations: Vec::new(),
            }),
            root_a,
            root_b,
            intermediate,
            cross_signed,
            bad_nonce_mode: BadNonceMode::Strict,
            new_order_status: "pending".into(),
            dns: None,
            rejected: HashSet::new(),
            failing_challenges: false,
            pending_polls: 0,
            txt_cname: None,
            alternate: Alternate::None,
        }
    }

    pub(crate) fn with_bad_nonce_mode(mut self, mode: BadNonceMode) -> Self {
        self.bad_nonce_mode = mode;
        self
    }

    pub(crate) fn with_new_order_status(mut self, status: &str) -> Self {
        self.new_order_status = status.to_string();
        self
    }

    /// 挑戰通知時到此 DNS 檢查 TXT 記錄。
    pub(crate) fn with_dns(mut self, dns: Arc<MemoryDns>) -> Self {
        self.dns = Some(dns);
        self
    }

    /// 此識別項的授權在通知後一律變成 `invalid`。
    pub(crate) fn with_rejected_identifier(mut self, value: &str) -> Self {
        self.rejected.insert(value.to_string());
        self
    }

    /// 挑戰通知一律回傳 500。
    pub(crate) fn with_failing_challenges(mut self) -> Self {
        self.failing_challenges = true;
        self
    }

    /// 通知後的前 `polls` 次授權讀取仍回傳 `pending`；`u32::MAX` 表示永遠不結束。
    pub(crate) fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// 在此名稱而非 `_acme-challenge.<識別項>` 查找 TXT 記錄。
    pub(crate) fn with_txt_cname(mut self, name: &str) -> Self {
        self.txt_cname = Some(name.to_string());
        self
    }

    pub(crate) fn with_alternate_chain(mut self) -> Self {
        self.alternate = Alternate::Valid;
        self
    }

    /// 替代鏈的連結指向不存在的位置。
    pub(crate) fn with_broken_alternate(mut self) -> Self {
        self.alternate = Alternate::Broken;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", BASE, path)
    }

    pub(crate) fn directory_url(&self) -> String {
        self.url("/directory")
    }

    pub(crate) fn root_key_id_a(&self) -> String {
        key_id(&self.root_a.cert)
    }

    pub(crate) fn root_key_id_b(&self) -> String {
        key_id(&self.root_b.cert)
    }

    pub(crate) fn head_count(&self) -> usize {
        self.state.lock().unwrap().heads
    }

    /// 路徑以 `prefix` 開頭的 POST 次數，包含被拒絕的請求。
    pub(crate) fn post_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .posts
            .iter()
            .filter(|path| path.starts_with(prefix))
            .count()
    }

    pub(crate) fn registered_contact(&self, account_url: &str) -> Option<Vec<String>> {
        let index = account_index(account_url)?;
        let state = self.state.lock().unwrap();
        state.accounts.get(index).map(|a| a.contact.clone())
    }

    /// 略過驗證，直接為已註冊帳戶簽發憑證並回傳憑證 URL。
    pub(crate) fn issue_directly(
        &self,
        account_url: &str,
        identifiers: &[Identifier],
        csr_der: &[u8],
    ) -> String {
        assert!(account_index(account_url).is_some());
        let req = X509Req::from_der(csr_der).unwrap();

        let mut state = self.state.lock().unwrap();
        let index = state.orders.len();
        state.orders.push(MockOrder {
            identifiers: identifiers.to_vec(),
            authorizations: Vec::new(),
            status: "ready".into(),
            chains: None,
        });
        self.issue(&mut state.orders[index], &req);
        self.url(&format!("/cert/{}", index))
    }

    fn respond(&self, state: &mut State, reply: Reply) -> HttpResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in reply.headers {
            headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(&value).unwrap(),
            );
        }
        let nonce = state.issue_nonce();
        if reply.retry {
            state.retry_nonces.insert(nonce.clone());
        }
        headers.insert(
            HeaderName::from_bytes(REPLAY_NONCE.as_bytes()).unwrap(),
            HeaderValue::from_str(&nonce).unwrap(),
        );

        HttpResponse {
            status: reply.status,
            headers,
            body: reply.body,
        }
    }

    fn handle_post(&self, state: &mut State, url: &str, body: &str) -> Reply {
        let Some(path) = url.strip_prefix(BASE) else {
            return Reply::problem(StatusCode::NOT_FOUND, "malformed", "unknown host");
        };
        state.posts.push(path.to_string());

        let Ok(jws) = serde_json::from_str::<JwsBody>(body) else {
            return Reply::problem(StatusCode::BAD_REQUEST, "malformed", "not a flattened JWS");
        };
        let header: Header =
            serde_json::from_slice(Base64::from_url(&jws.protected).unwrap().decode()).unwrap();

        let fresh = state.nonces.remove(&header.nonce);
        let reject = match self.bad_nonce_mode {
            BadNonceMode::Strict => !fresh,
            BadNonceMode::FirstUse => !(fresh && state.retry_nonces.remove(&header.nonce)),
            BadNonceMode::Always => true,
        };
        if reject {
            let mut reply = Reply::problem(StatusCode::BAD_REQUEST, "badNonce", "stale nonce");
            reply.retry = true;
            return reply;
        }

        if header.url != url || header.alg != "ES256" {
            return Reply::problem(StatusCode::UNAUTHORIZED, "unauthorized", "header mismatch");
        }

        let (account, key) = match (&header.jwk, &header.kid) {
            (Some(jwk), None) if path == "/new-account" => (None, public_key(jwk)),
            (None, Some(kid)) => match account_index(kid).filter(|i| *i < state.accounts.len()) {
                Some(index) => (Some(index), state.accounts[index].key.clone()),
                None => {
                    return Reply::problem(
                        StatusCode::BAD_REQUEST,
                        "accountDoesNotExist",
                        "unknown kid",
                    )
                }
            },
            _ => return Reply::problem(StatusCode::BAD_REQUEST, "malformed", "jwk xor kid"),
        };

        if !verify(&jws, &key) {
            return Reply::problem(StatusCode::BAD_REQUEST, "malformed", "bad signature");
        }

        let payload = Base64::from_url(&jws.payload).unwrap();
        let payload: Value = if payload.decode().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(payload.decode()).unwrap()
        };

        match account {
            None => self.new_account(state, header.jwk.as_ref().unwrap(), key, &payload),
            Some(account) => self.route(state, path, account, &payload),
        }
    }

    fn route(&self, state: &mut State, path: &str, account: usize, payload: &Value) -> Reply {
        if path == "/new-order" {
            return self.new_order(state, payload);
        }
        if let Some(index) = index(path, "/authz/") {
            return self.authorization(state, index);
        }
        if let Some(index) = index(path, "/chall/") {
            return self.challenge(state, index, account);
        }
        if let Some(index) = path
            .strip_prefix("/order/")
            .and_then(|rest| rest.strip_suffix("/finalize"))
            .and_then(|n| n.parse().ok())
        {
            return self.finalize(state, index, payload);
        }
        if let Some(rest) = path.strip_prefix("/cert/") {
            return self.certificate(state, rest);
        }
        Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such resource")
    }

    fn new_account(
        &self,
        state: &mut State,
        jwk: &Jwk,
        key: PKey<Public>,
        payload: &Value,
    ) -> Reply {
        let thumbprint = jwk.thumbprint();
        if let Some(index) = state.accounts.iter().position(|a| a.thumbprint == thumbprint) {
            return Reply::json(StatusCode::OK, json!({"status": "valid"}))
                .header("Location", self.url(&format!("/acct/{}", index)));
        }

        if payload["termsOfServiceAgreed"] != json!(true) {
            return Reply::problem(StatusCode::FORBIDDEN, "userActionRequired", "agree to ToS");
        }
        let contact: Vec<String> =
            serde_json::from_value(payload["contact"].clone()).unwrap_or_default();

        let index = state.accounts.len();
        state.accounts.push(MockAccount {
            contact: contact.clone(),
            thumbprint,
            key,
        });

        Reply::json(
            StatusCode::CREATED,
            json!({"status": "valid", "contact": contact}),
        )
        .header("Location", self.url(&format!("/acct/{}", index)))
    }

    fn new_order(&self, state: &mut State, payload: &Value) -> Reply {
        let identifiers: Vec<Identifier> =
            serde_json::from_value(payload["identifiers"].clone()).unwrap_or_default();
        if identifiers.is_empty() {
            return Reply::problem(StatusCode::BAD_REQUEST, "malformed", "no identifiers");
        }

        let mut authorizations = Vec::new();
        for identifier in &identifiers {
            let (value, wildcard) = match identifier.value.strip_prefix("*.") {
                Some(base) => (base.to_string(), true),
                None => (identifier.value.clone(), false),
            };
            authorizations.push(state.authorizations.len());
            state.authorizations.push(MockAuthorization {
                value,
                wildcard,
                token: random_token(),
                status: "pending",
                verdict: None,
            });
        }

        let index = state.orders.len();
        state.orders.push(MockOrder {
            identifiers,
            authorizations,
            status: self.new_order_status.clone(),
            chains: None,
        });

        Reply::json(StatusCode::CREATED, self.order_json(index, &state.orders[index]))
            .header("Location", self.url(&format!("/order/{}", index)))
    }

    fn authorization(&self, state: &mut State, index: usize) -> Reply {
        let Some(authorization) = state.authorizations.get_mut(index) else {
            return Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such authorization");
        };

        match authorization.verdict {
            Some((status, 0)) => {
                authorization.status = status;
                authorization.verdict = None;
            }
            Some((status, remaining)) => authorization.verdict = Some((status, remaining - 1)),
            None => {}
        }
        Reply::json(StatusCode::OK, self.authorization_json(index, authorization))
    }

    fn challenge(&self, state: &mut State, index: usize, account: usize) -> Reply {
        if self.failing_challenges {
            return Reply::problem(
                StatusCode::INTERNAL_SERVER_ERROR,
                "serverInternal",
                "validation unavailable",
            );
        }
        let thumbprint = state.accounts[account].thumbprint.clone();
        let Some(authorization) = state.authorizations.get_mut(index) else {
            return Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such challenge");
        };

        if authorization.status == "pending" && authorization.verdict.is_none() {
            let name = self
                .txt_cname
                .clone()
                .unwrap_or_else(|| format!("_acme-challenge.{}", authorization.value));
            let expected = dns_txt_value(&authorization.token, &thumbprint);
            let published = self
                .dns
                .as_ref()
                .map_or(true, |dns| dns.contains(&name, &expected));

            let status = if published && !self.rejected.contains(&authorization.value) {
                "valid"
            } else {
                "invalid"
            };
            if self.pending_polls == 0 {
                authorization.status = status;
            } else {
                authorization.verdict = Some((status, self.pending_polls));
            }
        }

        Reply::json(
            StatusCode::OK,
            json!({
                "type": "dns-01",
                "url": self.url(&format!("/chall/{}", index)),
                "token": authorization.token,
                "status": authorization.status,
            }),
        )
    }

    fn finalize(&self, state: &mut State, index: usize, payload: &Value) -> Reply {
        let Some(order) = state.orders.get(index) else {
            return Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such order");
        };
        let ready = order
            .authorizations
            .iter()
            .all(|a| state.authorizations[*a].status == "valid");
        if !ready {
            return Reply::problem(StatusCode::FORBIDDEN, "orderNotReady", "authorizations pending");
        }

        let Some(req) = payload["csr"]
            .as_str()
            .and_then(|csr| Base64::from_url(csr).ok())
            .and_then(|csr| X509Req::from_der(csr.decode()).ok())
        else {
            return Reply::problem(StatusCode::BAD_REQUEST, "badCSR", "unparsable CSR");
        };
        if !req.verify(&req.public_key().unwrap()).unwrap_or(false) {
            return Reply::problem(StatusCode::BAD_REQUEST, "badCSR", "bad CSR signature");
        }

        self.issue(&mut state.orders[index], &req);
        Reply::json(StatusCode::OK, self.order_json(index, &state.orders[index]))
    }

    fn certificate(&self, state: &mut State, rest: &str) -> Reply {
        let (number, variant) = rest.split_once('/').unwrap_or((rest, ""));
        let alternate = |suffix: &str| {
            let url = self.url(&format!("/cert/{}/{}", number, suffix));
            format!("<{}>;rel=\"alternate\"", url)
        };
        let Some((chain_a, chain_b)) = number
            .parse::<usize>()
            .ok()
            .and_then(|n| state.orders.get(n))
            .and_then(|order| order.chains.clone())
        else {
            return Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such certificate");
        };

        match variant {
            "" => {
                let reply = Reply::pem(&chain_a)
                    .header("Link", format!("<{}>;rel=\"index\"", self.directory_url()));
                match self.alternate {
                    Alternate::None => reply,
                    Alternate::Valid => reply.header("Link", alternate("alt")),
                    Alternate::Broken => reply.header("Link", alternate("gone")),
                }
            }
            "alt" => Reply::pem(&chain_b),
            _ => Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such certificate"),
        }
    }

    fn issue(&self, order: &mut MockOrder, req: &X509Req) {
        let sans: Vec<String> = order.identifiers.iter().map(|i| i.value.clone()).collect();
        let leaf = build_cert(
            req.subject_name(),
            &*req.public_key().unwrap(),
            Some(&self.intermediate),
            &self.intermediate.key,
            false,
            &sans,
        );

        let leaf_pem = pem(&leaf);
        order.chains = Some((
            format!("{}{}", leaf_pem, pem(&self.intermediate.cert)),
            format!("{}{}", leaf_pem, pem(&self.cross_signed)),
        ));
        order.status = "valid".into();
    }

    fn order_json(&self, index: usize, order: &MockOrder) -> Value {
        let authorizations: Vec<String> = order
            .authorizations
            .iter()
            .map(|a| self.url(&format!("/authz/{}", a)))
            .collect();
        json!({
            "status": order.status,
            "expires": EXPIRES,
            "identifiers": order.identifiers,
            "authorizations": authorizations,
            "finalize": self.url(&format!("/order/{}/finalize", index)),
            "certificate": order.chains.as_ref().map(|_| self.url(&format!("/cert/{}", index))),
        })
    }

    fn authorization_json(&self, index: usize, authorization: &MockAuthorization) -> Value {
        let challenge_status = match authorization.status {
            "pending" => "pending",
            "valid" => "valid",
            _ => "invalid",
        };
        json!({
            "status": authorization.status,
            "expires": EXPIRES,
            "identifier": {"type": "dns", "value": authorization.value},
            "challenges": [
                {
                    "type": "http-01",
                    "url": self.url(&format!("/http/{}", index)),
                    "token": authorization.token,
                    "status": challenge_status,
                },
                {
                    "type": "dns-01",
                    "url": self.url(&format!("/chall/{}", index)),
                    "token": authorization.token,
                    "status": challenge_status,
                }
            ],
            "wildcard": authorization.wildcard,
        })
    }

    fn directory_json(&self) -> Value {
        json!({
            "newNonce": self.url("/new-nonce"),
            "newAccount": self.url("/new-account"),
            "newOrder": self.url("/new-order"),
            "revokeCert": self.url("/revoke-cert"),
            "keyChange": self.url("/key-change"),
            "meta": {"termsOfService": self.url("/terms")},
        })
    }
}

impl HttpClientT for MockCa {
    fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let mut state = self.state.lock().unwrap();
        let reply = if url == self.directory_url() {
            Reply::json(StatusCode::OK, self.directory_json())
        } else {
            Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such resource")
        };
        Ok(self.respond(&mut state, reply))
    }

    fn head(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let mut state = self.state.lock().unwrap();
        state.heads += 1;
        let reply = if url == self.url("/new-nonce") {
            Reply {
                status: StatusCode::OK,
                body: Vec::new(),
                headers: Vec::new(),
                retry: false,
            }
        } else {
            Reply::problem(StatusCode::NOT_FOUND, "malformed", "no such resource")
        };
        Ok(self.respond(&mut state, reply))
    }

    fn post_jose(&self, url: &str, body: String) -> Result<HttpResponse, HttpError> {
        let mut state = self.state.lock().unwrap();
        let reply = self.handle_post(&mut state, url, &body);
        Ok(self.respond(&mut state, reply))
    }
}

/// 產生一條獨立的測試憑證鏈（終端 + 中繼），回傳 PEM 與根憑證金鑰識別碼。
pub(crate) fn test_chain_pem(names: &[&str]) -> (String, String) {
    let root = root("Standalone Root");
    let intermediate = intermediate("Standalone Intermediate", &root);

    let leaf_key = ec_key();
    let sans: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let leaf = build_cert(
        &name(names[0]),
        &*leaf_key,
        Some(&intermediate),
        &intermediate.key,
        false,
        &sans,
    );

    (
        format!("{}{}", pem(&leaf), pem(&intermediate.cert)),
        key_id(&root.cert),
    )
}

fn account_index(url: &str) -> Option<usize> {
    url.strip_prefix(BASE)
        .and_then(|path| index(path, "/acct/"))
}

fn index(path: &str, prefix: &str) -> Option<usize> {
    path.strip_prefix(prefix)?.parse().ok()
}

fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand_bytes(&mut bytes).unwrap();
    Base64::new(bytes).base64_url()
}

fn public_key(jwk: &Jwk) -> PKey<Public> {
    let Jwk::Ec(ec) = jwk;
    let x = BigNum::from_slice(Base64::from_url(ec.x()).unwrap().decode()).unwrap();
    let y = BigNum::from_slice(Base64::from_url(ec.y()).unwrap().decode()).unwrap();
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = EcKey::from_public_key_affine_coordinates(&group, &x, &y).unwrap();
    PKey::from_ec_key(key).unwrap()
}

fn verify(jws: &JwsBody, key: &PKey<Public>) -> bool {
    let Ok(signature) = Base64::from_url(&jws.signature) else {
        return false;
    };
    let raw = signature.decode();
    if raw.len() != 64 {
        return false;
    }

    let r = BigNum::from_slice(&raw[..32]).unwrap();
    let s = BigNum::from_slice(&raw[32..]).unwrap();
    let sig = EcdsaSig::from_private_components(r, s).unwrap();
    let digest = sha256(format!("{}.{}", jws.protected, jws.payload).as_bytes());

    sig.verify(&digest, &key.ec_key().unwrap()).unwrap_or(false)
}

fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("CN", common_name).unwrap();
    builder.build()
}

fn root(common_name: &str) -> Authority {
    let key = ec_key();
    let cert = build_cert(&name(common_name), &*key, None, &key, true, &[]);
    Authority { cert, key }
}

fn intermediate(common_name: &str, issuer: &Authority) -> Authority {
    let key = ec_key();
    let cert = build_cert(&name(common_name), &*key, Some(issuer), &issuer.key, true, &[]);
    Authority { cert, key }
}

fn build_cert<T: HasPublic>(
    subject: &X509NameRef,
    public_key: &PKeyRef<T>,
    issuer: Option<&Authority>,
    signer: &PKeyRef<Private>,
    is_ca: bool,
    sans: &[String],
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    builder.set_subject_name(subject).unwrap();
    builder
        .set_issuer_name(issuer.map_or(subject, |i| i.cert.subject_name()))
        .unwrap();
    builder.set_pubkey(public_key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(90).unwrap())
        .unwrap();

    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(ski).unwrap();

    if let Some(issuer) = issuer {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(true)
            .build(&builder.x509v3_context(Some(&*issuer.cert), None))
            .unwrap();
        builder.append_extension(aki).unwrap();
    }

    if is_ca {
        let constraints = BasicConstraints::new().critical().ca().build().unwrap();
        builder.append_extension(constraints).unwrap();
    }

    if !sans.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for name in sans {
            san.dns(name);
        }
        let ext = san
            .build(&builder.x509v3_context(issuer.map(|i| &*i.cert), None))
            .unwrap();
        builder.append_extension(ext).unwrap();
    }

    builder.sign(signer, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn pem(cert: &X509) -> String {
    String::from_utf8(cert.to_pem().unwrap()).unwrap()
}

fn key_id(cert: &X509) -> String {
    format_key_id(cert.subject_key_id().unwrap().as_slice())
}
