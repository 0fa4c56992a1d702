//! Key-set records and conversion into verification keys.

use p256::ecdsa::signature::Verifier as _;
use p256::{EncodedPoint, FieldBytes};
use rsa::signature::Verifier as _;
use rsa::{pkcs1v15, BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::claims::b64url_decode;
use crate::error::VerifyError;

/// Signature schemes accepted on structured tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    ES256,
    RS256,
}

impl Algorithm {
    pub fn parse(alg: &str) -> Option<Self> {
        match alg {
            "ES256" => Some(Algorithm::ES256),
            "RS256" => Some(Algorithm::RS256),
            _ => None,
        }
    }
}

/// One entry of a published key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub use_: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// One element of a published `keys` array. Anything that does not read as a
/// [`KeyRecord`] is kept raw so the rest of the set still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyEntry {
    Record(KeyRecord),
    Unreadable(serde_json::Value),
}

impl From<KeyRecord> for KeyEntry {
    fn from(record: KeyRecord) -> Self {
        KeyEntry::Record(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<KeyEntry>,
}

impl KeySet {
    pub fn from_records(records: impl IntoIterator<Item = KeyRecord>) -> Self {
        Self { keys: records.into_iter().map(KeyEntry::from).collect() }
    }

    /// Entries that read as key records.
    pub fn records(&self) -> impl Iterator<Item = &KeyRecord> {
        self.keys.iter().filter_map(|entry| match entry {
            KeyEntry::Record(record) => Some(record),
            KeyEntry::Unreadable(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    P256(p256::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Verifies `signature` over `message`. A key that does not belong to
    /// `alg` never verifies.
    pub fn verify(&self, alg: Algorithm, message: &[u8], signature: &[u8]) -> Result<(), VerifyError> {
        match (self, alg) {
            (PublicKey::Rsa(key), Algorithm::RS256) => {
                let vk = pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
                let sig = pkcs1v15::Signature::try_from(signature).map_err(|_| VerifyError::SignatureInvalid)?;
                vk.verify(message, &sig).map_err(|_| VerifyError::SignatureInvalid)
            }
            (PublicKey::P256(vk), Algorithm::ES256) => {
                let sig = p256::ecdsa::Signature::from_slice(signature).map_err(|_| VerifyError::SignatureInvalid)?;
                vk.verify(message, &sig).map_err(|_| VerifyError::SignatureInvalid)
            }
            _ => Err(VerifyError::SignatureInvalid),
        }
    }
}

/// Builds an RSA key from base64url big-endian modulus and exponent.
pub fn rsa_from_components(n: &str, e: &str) -> Result<RsaPublicKey, VerifyError> {
    let n = b64url_decode(n).map_err(|err| VerifyError::InvalidKeyMaterial(format!("modulus: {err}")))?;
    let e = b64url_decode(e).map_err(|err| VerifyError::InvalidKeyMaterial(format!("exponent: {err}")))?;
    RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
        .map_err(|err| VerifyError::InvalidKeyMaterial(format!("rsa: {err}")))
}

/// Builds a P-256 key from base64url affine coordinates.
pub fn p256_from_coordinates(x: &str, y: &str) -> Result<p256::ecdsa::VerifyingKey, VerifyError> {
    let x = b64url_decode(x).map_err(|err| VerifyError::InvalidKeyMaterial(format!("x: {err}")))?;
    let y = b64url_decode(y).map_err(|err| VerifyError::InvalidKeyMaterial(format!("y: {err}")))?;
    if x.len() != 32 || y.len() != 32 {
        return Err(VerifyError::InvalidKeyMaterial("P-256 coordinates must be 32 bytes".into()));
    }
    let point = EncodedPoint::from_affine_coordinates(
        &FieldBytes::clone_from_slice(&x),
        &FieldBytes::clone_from_slice(&y),
        false,
    );
    p256::ecdsa::VerifyingKey::from_encoded_point(&point)
        .map_err(|_| VerifyError::InvalidKeyMaterial("point not on P-256".into()))
}

/// Converts one record. `Ok(None)` means the key type is not one we verify with.
pub fn convert(record: &KeyRecord) -> Result<Option<PublicKey>, VerifyError> {
    match record.kty.as_str() {
        "RSA" => {
            let n = record.n.as_deref().ok_or_else(|| VerifyError::InvalidKeyMaterial("missing n".into()))?;
            let e = record.e.as_deref().ok_or_else(|| VerifyError::InvalidKeyMaterial("missing e".into()))?;
            rsa_from_components(n, e).map(|k| Some(PublicKey::Rsa(k)))
        }
        "EC" if record.crv.as_deref() == Some("P-256") => {
            let x = record.x.as_deref().ok_or_else(|| VerifyError::InvalidKeyMaterial("missing x".into()))?;
            let y = record.y.as_deref().ok_or_else(|| VerifyError::InvalidKeyMaterial("missing y".into()))?;
            p256_from_coordinates(x, y).map(|k| Some(PublicKey::P256(k)))
        }
        _ => Ok(None),
    }
}
