use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use parking_lot::Mutex;
use parley_db::Store;
use rand::random;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const KEY_ACCOUNT: &str = "server_credentials_key_v1";

/// What we keep for a logged-in server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Row format in `server_credentials.credential_value`.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
enum Envelope {
    #[serde(rename = "none")]
    Plain { payload: String },
    #[serde(rename = "keyring_aes_256_gcm_v1")]
    Sealed { payload: String, nonce: String },
}

/// Persists credentials in the local store, sealed with a keyring-held key
/// in release builds. The server url is bound in as associated data so a
/// blob copied between rows fails to open.
pub struct CredentialStore {
    store: Arc<Mutex<Store>>,
    key: KeyringKey,
}

impl CredentialStore {
    pub fn new(service: impl Into<String>, store: Arc<Mutex<Store>>) -> Self {
        Self {
            store,
            key: KeyringKey::new(service.into()),
        }
    }

    pub fn load(&self, server_url: &str) -> Result<Option<StoredCredential>> {
        let raw = self.store.lock().server_credentials().get(server_url)?;
        raw.map(|raw| self.open_envelope(server_url, &raw))
            .transpose()
    }

    pub fn save(&self, server_url: &str, credential: &StoredCredential) -> Result<()> {
        let envelope = self.seal_envelope(server_url, credential)?;
        let raw = serde_json::to_string(&envelope)?;
        self.store.lock().server_credentials().upsert(
            server_url,
            &raw,
            credential.user_id,
            credential.username.as_deref(),
        )?;
        Ok(())
    }

    pub fn delete(&self, server_url: &str) -> Result<bool> {
        Ok(self.store.lock().server_credentials().delete(server_url)?)
    }

    fn seal_envelope(&self, server_url: &str, credential: &StoredCredential) -> Result<Envelope> {
        let payload = serde_json::to_string(credential)?;
        if !seal_by_default() {
            return Ok(Envelope::Plain { payload });
        }

        let key = self.key.get_or_create()?;
        let nonce: [u8; 12] = random();
        let sealed = seal(&key, nonce, server_url, payload.into_bytes())?;
        Ok(Envelope::Sealed {
            payload: STANDARD_NO_PAD.encode(sealed),
            nonce: STANDARD_NO_PAD.encode(nonce),
        })
    }

    fn open_envelope(&self, server_url: &str, raw: &str) -> Result<StoredCredential> {
        match serde_json::from_str::<Envelope>(raw)? {
            Envelope::Plain { payload } => Ok(serde_json::from_str(&payload)?),
            Envelope::Sealed { payload, nonce } => {
                let nonce = decode_fixed::<12>(&nonce)?;
                let sealed = STANDARD_NO_PAD.decode(payload)?;
                let plaintext = open(&self.key.get()?, nonce, server_url, sealed)?;
                Ok(serde_json::from_slice(&plaintext)?)
            }
        }
    }
}

/// The AES key lives in the OS keyring; it is read at most once per process.
struct KeyringKey {
    service: String,
    cached: Mutex<Option<[u8; 32]>>,
}

impl KeyringKey {
    fn new(service: String) -> Self {
        Self {
            service,
            cached: Mutex::new(None),
        }
    }

    fn get(&self) -> Result<[u8; 32]> {
        let mut cached = self.cached.lock();
        if let Some(key) = *cached {
            return Ok(key);
        }
        let encoded = self.entry()?.get_password()?;
        let key = decode_fixed::<32>(&encoded)?;
        *cached = Some(key);
        Ok(key)
    }

    fn get_or_create(&self) -> Result<[u8; 32]> {
        match self.get() {
            Err(Error::Keyring(keyring::Error::NoEntry)) => {
                let key: [u8; 32] = random();
                self.entry()?.set_password(&STANDARD_NO_PAD.encode(key))?;
                *self.cached.lock() = Some(key);
                tracing::debug!(service = %self.service, "created credential encryption key");
                Ok(key)
            }
            other => other,
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, KEY_ACCOUNT)?)
    }
}

/// Debug builds keep rows readable so the keyring is never touched in
/// development.
fn seal_by_default() -> bool {
    !cfg!(debug_assertions)
}

fn decode_fixed<const N: usize>(encoded: &str) -> Result<[u8; N]> {
    STANDARD_NO_PAD
        .decode(encoded)?
        .try_into()
        .map_err(|_| Error::Crypto("unexpected key or nonce length"))
}

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey> {
    UnboundKey::new(&AES_256_GCM, key)
        .map(LessSafeKey::new)
        .map_err(|_| Error::Crypto("invalid key material"))
}

fn seal(key: &[u8; 32], nonce: [u8; 12], server_url: &str, mut data: Vec<u8>) -> Result<Vec<u8>> {
    aead_key(key)?
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(server_url.as_bytes()),
            &mut data,
        )
        .map_err(|_| Error::Crypto("failed to seal credential"))?;
    Ok(data)
}

fn open(key: &[u8; 32], nonce: [u8; 12], server_url: &str, mut data: Vec<u8>) -> Result<Vec<u8>> {
    let plaintext = aead_key(key)?
        .open_in_place(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(server_url.as_bytes()),
            &mut data,
        )
        .map_err(|_| Error::Crypto("failed to open credential"))?;
    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD_NO_PAD;
    use parking_lot::Mutex;
    use parley_db::Store;

    use super::{CredentialStore, Envelope, StoredCredential, decode_fixed, open, seal};
    use crate::error::Error;

    const SERVER: &str = "http://127.0.0.1:5000";

    fn credential() -> StoredCredential {
        StoredCredential {
            access_token: "jwt".to_string(),
            user_id: Some(3),
            username: Some("alice".to_string()),
        }
    }

    #[test]
    fn sealed_credential_opens_only_for_its_server() {
        let key = [7u8; 32];
        let nonce = [1u8; 12];
        let sealed = seal(&key, nonce, SERVER, b"secret".to_vec()).unwrap();
        assert_ne!(sealed, b"secret");

        let opened = open(&key, nonce, SERVER, sealed.clone()).unwrap();
        assert_eq!(opened, b"secret");

        assert!(matches!(
            open(&key, nonce, "http://elsewhere", sealed),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn fixed_length_decoding_checks_size() {
        assert!(decode_fixed::<32>(&STANDARD_NO_PAD.encode([0u8; 32])).is_ok());
        assert!(matches!(
            decode_fixed::<32>(&STANDARD_NO_PAD.encode([0u8; 16])),
            Err(Error::Crypto(_))
        ));
        assert!(matches!(decode_fixed::<12>("!!"), Err(Error::Encoding(_))));
    }

    #[test]
    fn envelope_wire_format() {
        let plain: Envelope =
            serde_json::from_str(r#"{"method":"none","payload":"{}"}"#).unwrap();
        assert_eq!(
            plain,
            Envelope::Plain {
                payload: "{}".to_string()
            }
        );

        let sealed: Envelope = serde_json::from_str(
            r#"{"method":"keyring_aes_256_gcm_v1","payload":"AA","nonce":"AA"}"#,
        )
        .unwrap();
        assert!(matches!(sealed, Envelope::Sealed { .. }));

        assert!(serde_json::from_str::<Envelope>(r#"{"method":"rot13","payload":""}"#).is_err());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn debug_builds_round_trip_through_plain_envelope() {
        let store = Arc::new(Mutex::new(Store::open_in_memory().unwrap()));
        let credentials = CredentialStore::new("parley-test", Arc::clone(&store));

        credentials.save(SERVER, &credential()).unwrap();
        assert_eq!(credentials.load(SERVER).unwrap(), Some(credential()));

        let record = store
            .lock()
            .server_credentials()
            .get_record(SERVER)
            .unwrap()
            .unwrap();
        assert_eq!(record.username.as_deref(), Some("alice"));
        assert!(record.credential_value.contains(r#""method":"none""#));

        assert!(credentials.delete(SERVER).unwrap());
        assert_eq!(credentials.load(SERVER).unwrap(), None);
    }

    #[test]
    fn garbage_row_is_a_parse_error() {
        let store = Arc::new(Mutex::new(Store::open_in_memory().unwrap()));
        store
            .lock()
            .server_credentials()
            .upsert(SERVER, "not json", None, None)
            .unwrap();

        let credentials = CredentialStore::new("parley-test", store);
        assert!(matches!(
            credentials.load(SERVER),
            Err(Error::CredentialParse(_))
        ));
    }
}
