use openssl::{
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcKey},
    error::ErrorStack,
    nid::Nid,
    pkey::{Id, PKey, Private},
    rsa::Rsa,
    sha::sha256,
};
use thiserror::Error;

use crate::{
    base64::Base64,
    jwk::{EcJwk, Jwk},
};

/// 金鑰相關操作的錯誤列舉。
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] ErrorStack),
    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("Unsupported elliptic curve, only P-256 is accepted")]
    UnsupportedCurve,
    #[error("Malformed private key PEM: {0}")]
    MalformedPem(ErrorStack),
    #[error("Private key is not valid UTF-8 PEM")]
    NonUtf8Pem,
}

type Result<T> = std::result::Result<T, KeyError>;

/// 金鑰使用的演算法。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// P-256 橢圓曲線，用於帳戶金鑰與 ES256 簽名。
    EcP256,
    /// RSA，用於憑證專用金鑰。
    Rsa,
}

/// 表示一組非對稱金鑰對。
///
/// 帳戶金鑰固定為 P-256（以 ES256 簽署 JWS），
/// 每張憑證另外產生一組專用的 RSA 金鑰，兩者互不重用。
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// 金鑰演算法。
    pub alg: KeyAlgorithm,
    /// 私鑰，使用 OpenSSL 的 `PKey` 封裝。
    pub pri_key: PKey<Private>,
}

impl KeyPair {
    /// 憑證金鑰預設長度。
    pub const DEFAULT_RSA_BITS: u32 = 2048;

    /// 產生一組新的 P-256 金鑰對。
    pub fn generate_ec() -> Result<Self> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let ec_key = EcKey::generate(&group)?;
        Ok(Self {
            alg: KeyAlgorithm::EcP256,
            pri_key: PKey::from_ec_key(ec_key)?,
        })
    }

    /// 產生一組新的 RSA 金鑰對。
    pub fn generate_rsa(bits: u32) -> Result<Self> {
        let rsa = Rsa::generate(bits)?;
        Ok(Self {
            alg: KeyAlgorithm::Rsa,
            pri_key: PKey::from_rsa(rsa)?,
        })
    }

    /// 根據 PEM 格式的私鑰建立金鑰對。
    ///
    /// 同時接受 SEC1（`EC PRIVATE KEY`）、PKCS#1（`RSA PRIVATE KEY`）與 PKCS#8 格式。
    /// EC 金鑰必須位於 P-256 曲線上。
    ///
    /// # 錯誤
    ///
    /// PEM 無法解析時回傳 [`KeyError::MalformedPem`]，此時不會發出任何網路請求。
    pub fn from_pem(pri_key_pem: &[u8]) -> Result<Self> {
        let pri_key = PKey::private_key_from_pem(pri_key_pem).map_err(KeyError::MalformedPem)?;

        let alg = match pri_key.id() {
            Id::EC => {
                let curve = pri_key.ec_key()?.group().curve_name();
                if curve != Some(Nid::X9_62_PRIME256V1) {
                    return Err(KeyError::UnsupportedCurve);
                }
                KeyAlgorithm::EcP256
            }
            Id::RSA => KeyAlgorithm::Rsa,
            _ => return Err(KeyError::UnsupportedAlgorithm),
        };

        Ok(Self { alg, pri_key })
    }

    /// 將私鑰匯出為 PEM。
    ///
    /// EC 金鑰輸出 SEC1 格式，RSA 金鑰輸出 PKCS#1 格式。
    pub fn to_pem(&self) -> Result<String> {
        let pem = match self.alg {
            KeyAlgorithm::EcP256 => self.pri_key.ec_key()?.private_key_to_pem()?,
            KeyAlgorithm::Rsa => self.pri_key.rsa()?.private_key_to_pem()?,
        };
        String::from_utf8(pem).map_err(|_| KeyError::NonUtf8Pem)
    }

    /// 取得公鑰的 JWK 表示，目前僅支援 P-256。
    pub fn jwk(&self) -> Result<Jwk> {
        if self.alg != KeyAlgorithm::EcP256 {
            return Err(KeyError::UnsupportedAlgorithm);
        }

        let ec_key = self.pri_key.ec_key()?;
        let mut ctx = BigNumContext::new()?;
        let mut x = BigNum::new()?;
        let mut y = BigNum::new()?;
        ec_key
            .public_key()
            .affine_coordinates_gfp(ec_key.group(), &mut x, &mut y, &mut ctx)?;

        Ok(Jwk::Ec(EcJwk::new(
            "P-256",
            Base64::new(x.to_vec_padded(32)?).base64_url(),
            Base64::new(y.to_vec_padded(32)?).base64_url(),
        )))
    }

    /// 計算 RFC 7638 的 JWK thumbprint，以無填充 URL 安全 Base64 回傳。
    pub fn thumbprint(&self) -> Result<String> {
        Ok(self.jwk()?.thumbprint())
    }
}

/// 計算任意位元組的 SHA-256 並以 URL 安全 Base64 表示。
pub fn sha256_base64_url(data: &[u8]) -> String {
    Base64::new(sha256(data)).base64_url()
}
