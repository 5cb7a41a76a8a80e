use super::is_sensitive;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Once;

/// Marker in front of every encrypted value.
pub const ENCRYPTED_PREFIX: &str = "encrypted:";

/// Environment variable holding the 32-byte key (hex or base64).
pub const KEY_ENV_VAR: &str = "HOMEBOARD_ENCRYPTION_KEY";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

static PASSTHROUGH_WARNING: Once = Once::new();

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("encrypted value is malformed: {0}")]
    Malformed(String),

    #[error("encrypted value failed authentication (wrong key or tampered data)")]
    Authentication,

    #[error("encryption failed")]
    Encryption,
}

/// Authenticated encryption of individual credential fields.
///
/// Encoded form: `encrypted:` + base64(nonce ‖ tag ‖ ciphertext). Without a
/// key both directions pass values through unchanged, warning once per process.
#[derive(Clone)]
pub struct FieldCipher {
    aead: Option<ChaCha20Poly1305>,
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl FieldCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            aead: Some(ChaCha20Poly1305::new(Key::from_slice(&key))),
        }
    }

    /// Cipher without a key: every operation is a passthrough.
    pub fn disabled() -> Self {
        Self { aead: None }
    }

    /// Parse a key given as 64 hex characters or base64 of 32 bytes.
    pub fn from_key_material(material: &str) -> Result<Self, CipherError> {
        let material = material.trim();
        let bytes = if material.len() == KEY_LEN * 2 && material.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(material).map_err(|e| CipherError::InvalidKey(e.to_string()))?
        } else {
            BASE64_STANDARD
                .decode(material)
                .map_err(|_| CipherError::InvalidKey("expected 64 hex characters or base64".to_string()))?
        };

        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            CipherError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, bytes.len()))
        })?;
        Ok(Self::new(key))
    }

    /// Cipher configured from [`KEY_ENV_VAR`]. A missing or invalid key yields
    /// a disabled cipher.
    pub fn from_env() -> Self {
        match std::env::var(KEY_ENV_VAR) {
            Ok(material) if !material.trim().is_empty() => match Self::from_key_material(&material) {
                Ok(cipher) => {
                    tracing::debug!("Field encryption enabled");
                    cipher
                }
                Err(e) => {
                    tracing::error!(env = KEY_ENV_VAR, error = %e, "Ignoring invalid encryption key");
                    Self::disabled()
                }
            },
            _ => Self::disabled(),
        }
    }

    /// Random key encoded as hex, suitable for [`KEY_ENV_VAR`].
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        hex::encode(key)
    }

    pub fn is_enabled(&self) -> bool {
        self.aead.is_some()
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPTED_PREFIX)
    }

    /// Encrypt `plaintext`. Empty and already-encrypted values are returned as is.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() || Self::is_encrypted(plaintext) {
            return Ok(plaintext.to_string());
        }
        let Some(aead) = &self.aead else {
            warn_passthrough();
            return Ok(plaintext.to_string());
        };

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        // The AEAD output is ciphertext followed by the tag.
        let sealed = aead
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut packed = Vec::with_capacity(NONCE_LEN + sealed.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(tag);
        packed.extend_from_slice(ciphertext);
        Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64_STANDARD.encode(packed)))
    }

    /// Decrypt `value`. Values without the prefix are returned as is.
    pub fn decrypt(&self, value: &str) -> Result<String, CipherError> {
        let Some(encoded) = value.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(value.to_string());
        };
        let Some(aead) = &self.aead else {
            warn_passthrough();
            return Ok(value.to_string());
        };

        let packed = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| CipherError::Malformed(e.to_string()))?;
        if packed.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Malformed(format!(
                "{} bytes is shorter than nonce and tag",
                packed.len()
            )));
        }

        let (nonce, rest) = packed.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        let mut sealed = Vec::with_capacity(rest.len());
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let plaintext = aead
            .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
            .map_err(|_| CipherError::Authentication)?;
        String::from_utf8(plaintext).map_err(|e| CipherError::Malformed(e.to_string()))
    }

    /// Copy of `value` with every string under a credential-named field encrypted.
    pub fn encrypt_sensitive_fields(&self, value: &Value) -> Result<Value, CipherError> {
        self.map_sensitive(value, &|s: &str| self.encrypt(s))
    }

    /// Inverse of [`FieldCipher::encrypt_sensitive_fields`].
    pub fn decrypt_sensitive_fields(&self, value: &Value) -> Result<Value, CipherError> {
        self.map_sensitive(value, &|s: &str| self.decrypt(s))
    }

    /// Decrypt credential-named entries of a header map.
    pub fn decrypt_headers(
        &self,
        headers: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, CipherError> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if is_sensitive(name) {
                    self.decrypt(value)?
                } else {
                    value.clone()
                };
                Ok((name.clone(), value))
            })
            .collect()
    }

    fn map_sensitive(
        &self,
        value: &Value,
        op: &dyn Fn(&str) -> Result<String, CipherError>,
    ) -> Result<Value, CipherError> {
        let Value::Object(map) = value else {
            return Ok(value.clone());
        };
        let mut out = Map::with_capacity(map.len());
        for (name, field) in map {
            let field = match field {
                Value::Object(_) => self.map_sensitive(field, op)?,
                Value::String(s) if is_sensitive(name) => Value::String(op(s)?),
                other => other.clone(),
            };
            out.insert(name.clone(), field);
        }
        Ok(Value::Object(out))
    }
}

impl Default for FieldCipher {
    fn default() -> Self {
        Self::disabled()
    }
}

fn warn_passthrough() {
    PASSTHROUGH_WARNING.call_once(|| {
        tracing::warn!(
            env = KEY_ENV_VAR,
            "No encryption key configured, credentials are stored and read as plaintext"
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn cipher() -> FieldCipher {
        FieldCipher::from_key_material(HEX_KEY).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();
        for plaintext in ["a", "s3cr3t-api-key", "пароль", "x".repeat(1000).as_str()] {
            let encrypted = cipher.encrypt(plaintext).unwrap();
            assert!(encrypted.starts_with(ENCRYPTED_PREFIX));
            assert_ne!(encrypted, plaintext);
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_nonce_is_random_per_value() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_encoded_layout() {
        let encrypted = cipher().encrypt("abcd").unwrap();
        let packed = BASE64_STANDARD
            .decode(encrypted.strip_prefix(ENCRYPTED_PREFIX).unwrap())
            .unwrap();
        assert_eq!(packed.len(), NONCE_LEN + TAG_LEN + 4);
    }

    #[test]
    fn test_idempotent_on_processed_input() {
        let cipher = cipher();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt("plain").unwrap(), "plain");

        let once = cipher.encrypt("value").unwrap();
        assert_eq!(cipher.encrypt(&once).unwrap(), once);
    }

    #[test]
    fn test_disabled_cipher_passes_through() {
        let cipher = FieldCipher::disabled();
        assert!(!cipher.is_enabled());
        assert_eq!(cipher.encrypt("plain").unwrap(), "plain");
        assert_eq!(cipher.decrypt("encrypted:abc").unwrap(), "encrypted:abc");
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let encrypted = cipher().encrypt("value").unwrap();
        let other = FieldCipher::new([7u8; KEY_LEN]);
        assert!(matches!(other.decrypt(&encrypted), Err(CipherError::Authentication)));
    }

    #[test]
    fn test_truncated_value_is_malformed() {
        let cipher = cipher();
        assert!(matches!(cipher.decrypt("encrypted:AAAA"), Err(CipherError::Malformed(_))));
        assert!(matches!(cipher.decrypt("encrypted:!!"), Err(CipherError::Malformed(_))));
    }

    #[test]
    fn test_key_material_formats() {
        let base64_key = BASE64_STANDARD.encode([9u8; KEY_LEN]);
        assert!(FieldCipher::from_key_material(&base64_key).unwrap().is_enabled());
        assert!(FieldCipher::from_key_material(HEX_KEY).is_ok());
        assert!(matches!(
            FieldCipher::from_key_material("too-short"),
            Err(CipherError::InvalidKey(_))
        ));
        assert!(matches!(
            FieldCipher::from_key_material(&BASE64_STANDARD.encode([1u8; 16])),
            Err(CipherError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_generated_key_is_usable() {
        let key = FieldCipher::generate_key();
        assert_eq!(key.len(), 64);
        assert!(FieldCipher::from_key_material(&key).unwrap().is_enabled());
    }

    #[test]
    fn test_sensitive_fields_round_trip() {
        let cipher = cipher();
        let input = json!({
            "name": "Plex",
            "plexToken": "abc123",
            "connection": { "password": "hunter2", "host": "nas" },
            "port": 32400
        });

        let sealed = cipher.encrypt_sensitive_fields(&input).unwrap();
        assert_eq!(sealed["name"], "Plex");
        assert!(sealed["plexToken"].as_str().unwrap().starts_with(ENCRYPTED_PREFIX));
        assert!(sealed["connection"]["password"]
            .as_str()
            .unwrap()
            .starts_with(ENCRYPTED_PREFIX));
        assert_eq!(sealed["connection"]["host"], "nas");

        assert_eq!(cipher.decrypt_sensitive_fields(&sealed).unwrap(), input);
    }

    #[test]
    fn test_decrypt_headers_only_touches_sensitive_names() {
        let cipher = cipher();
        let mut headers = BTreeMap::new();
        headers.insert("X-Api-Key".to_string(), cipher.encrypt("k3y").unwrap());
        headers.insert("Accept".to_string(), "application/json".to_string());

        let plain = cipher.decrypt_headers(&headers).unwrap();
        assert_eq!(plain["X-Api-Key"], "k3y");
        assert_eq!(plain["Accept"], "application/json");
    }
}
