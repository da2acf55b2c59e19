//! Secret Vault - 시크릿 암호화/복호화
//!
//! 프로세스 전역 대칭키 1개로 사용자 시크릿(AI API 키, 메일 비밀번호)을
//! 저장 가능한 불투명 문자열로 바꾸고, 필요할 때만 다시 평문으로 복원합니다.
//!
//! Blob 포맷 (v1, URL-safe base64로 인코딩):
//! - version: `0x01` (1 byte)
//! - nonce: 24 bytes (XChaCha20-Poly1305)
//! - ciphertext: AEAD 결과 (= 암호문 + 태그)
//!
//! AAD: version 바이트 (포맷 바인딩)

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use once_cell::sync::OnceCell;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// 키 material을 담는 기본 환경 변수
pub const VAULT_KEY_ENV: &str = "MAILWISE_VAULT_KEY";

/// 키 길이 (256-bit)
pub const KEY_LEN: usize = 32;

/// Nonce 길이 (XChaCha20-Poly1305용 24 bytes)
pub const NONCE_LEN: usize = 24;

/// Poly1305 태그 길이
const TAG_LEN: usize = 16;

/// Blob 포맷 버전
pub const BLOB_VERSION: u8 = 1;

/// Vault 오류
///
/// `Decryption`은 원인(손상된 blob, 변조, 다른 키)을 구분하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Vault configuration error: {0}")]
    Configuration(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Credential unavailable, please re-enter it")]
    Decryption,
}

/// 암호화된 시크릿 (저장용 불투명 문자열)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedSecret(String);

impl EncryptedSecret {
    /// 저장소에서 읽어온 값을 감쌉니다. 유효성은 복호화 시점에 검증됩니다.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedSecret({} chars)", self.0.len())
    }
}

/// Vault 대칭키 (drop 시 zeroize)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    bytes: [u8; KEY_LEN],
}

impl VaultKey {
    /// 새 키 생성 (CSPRNG)
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill(&mut bytes);
        Self { bytes }
    }

    /// 키 material 파싱
    ///
    /// 허용 형식:
    /// - standard / URL-safe base64 (디코딩 결과가 정확히 32 bytes)
    /// - 32 bytes 원문 문자열
    pub fn parse(material: &str) -> Result<Self, VaultError> {
        let material = material.trim();
        if material.is_empty() {
            return Err(VaultError::Configuration(
                "key material is empty".to_string(),
            ));
        }

        for engine in [&STANDARD, &URL_SAFE] {
            if let Ok(mut decoded) = engine.decode(material) {
                let parsed = Self::from_slice(&decoded);
                decoded.zeroize();
                if let Some(key) = parsed {
                    return Ok(key);
                }
            }
        }

        Self::from_slice(material.as_bytes()).ok_or_else(|| {
            VaultError::Configuration(format!(
                "key material must be {} bytes, raw or base64-encoded",
                KEY_LEN
            ))
        })
    }

    /// 환경 변수에서 키 로드
    pub fn from_env_var(name: &str) -> Result<Self, VaultError> {
        let mut material = match std::env::var(name) {
            Ok(value) => value,
            Err(std::env::VarError::NotPresent) => {
                return Err(VaultError::Configuration(format!("{} is not set", name)))
            }
            Err(std::env::VarError::NotUnicode(_)) => {
                return Err(VaultError::Configuration(format!(
                    "{} is not valid UTF-8",
                    name
                )))
            }
        };

        let key = Self::parse(&material);
        material.zeroize();
        key
    }

    /// 운영자 배포용 base64 인코딩
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.bytes))
    }

    /// 로그에 남길 수 있는 유일한 키 파생 값 (SHA-256 앞 8 bytes)
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Some(Self { bytes: key })
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultKey({})", self.fingerprint())
    }
}

/// Secret Vault
///
/// 키를 소유한 명시적 객체로, 필요한 컴포넌트에 참조로 전달합니다.
/// 상태가 키뿐이므로 여러 스레드에서 잠금 없이 공유할 수 있습니다.
pub struct SecretVault {
    key: VaultKey,
}

impl SecretVault {
    pub fn new(key: VaultKey) -> Self {
        Self { key }
    }

    pub fn from_env_var(name: &str) -> Result<Self, VaultError> {
        let key = VaultKey::from_env_var(name)?;
        tracing::info!(fingerprint = %key.fingerprint(), "Vault key loaded from {}", name);
        Ok(Self::new(key))
    }

    pub fn fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    /// 평문 시크릿 암호화 (호출마다 새 nonce)
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, VaultError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce);

        let cipher = XChaCha20Poly1305::new((&self.key.bytes).into());
        let header = [BLOB_VERSION];
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &header,
                },
            )
            .map_err(|_| VaultError::Encryption)?;

        let mut blob = Vec::with_capacity(header.len() + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&header);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        Ok(EncryptedSecret(URL_SAFE.encode(blob)))
    }

    /// 시크릿 복호화
    ///
    /// 인코딩 오류, 길이 오류, 버전 불일치, 태그 검증 실패는 모두
    /// 동일한 `VaultError::Decryption`으로 보고됩니다.
    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<Zeroizing<String>, VaultError> {
        let blob = URL_SAFE
            .decode(secret.as_str())
            .map_err(|_| VaultError::Decryption)?;

        if blob.len() < 1 + NONCE_LEN + TAG_LEN || blob[0] != BLOB_VERSION {
            return Err(VaultError::Decryption);
        }

        let (header, rest) = blob.split_at(1);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new((&self.key.bytes).into());
        let plaintext = cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| VaultError::Decryption)?;

        String::from_utf8(plaintext).map(Zeroizing::new).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            VaultError::Decryption
        })
    }
}

impl fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretVault")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// 지연 로딩되는 프로세스 전역 Vault 핸들
///
/// 첫 사용 시 1회만 키를 로드합니다. 로드 실패는 캐시되지 않으므로
/// 설정을 고친 뒤 다음 호출에서 다시 시도합니다.
pub struct LazyVault {
    env_var: String,
    cell: OnceCell<SecretVault>,
}

impl LazyVault {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Result<&SecretVault, VaultError> {
        self.cell
            .get_or_try_init(|| SecretVault::from_env_var(&self.env_var))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}
