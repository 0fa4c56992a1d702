//! Deterministic signing keys and token builders shared by unit tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine as _};
use once_cell::sync::Lazy;
use p256::ecdsa::signature::Signer as _;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rsa::pkcs1v15;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value as Json};
use sha2::Sha256;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::KeySource;
use crate::error::FetchError;
use crate::http::Deadline;
use crate::keys::{KeyRecord, KeySet};
use crate::now_ts;

pub static RSA_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    RsaPrivateKey::new(&mut rng, 2048).expect("rsa keygen")
});

pub static EC_KEY: Lazy<p256::ecdsa::SigningKey> = Lazy::new(|| {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    p256::ecdsa::SigningKey::random(&mut rng)
});

pub fn rsa_record(kid: &str) -> KeyRecord {
    let public = RSA_KEY.to_public_key();
    KeyRecord {
        kid: kid.into(),
        kty: "RSA".into(),
        alg: Some("RS256".into()),
        use_: Some("sig".into()),
        n: Some(B64URL.encode(public.n().to_bytes_be())),
        e: Some(B64URL.encode(public.e().to_bytes_be())),
        crv: None,
        x: None,
        y: None,
    }
}

pub fn ec_record(kid: &str) -> KeyRecord {
    let point = EC_KEY.verifying_key().to_encoded_point(false);
    KeyRecord {
        kid: kid.into(),
        kty: "EC".into(),
        alg: Some("ES256".into()),
        use_: None,
        n: None,
        e: None,
        crv: Some("P-256".into()),
        x: point.x().map(|x| B64URL.encode(x)),
        y: point.y().map(|y| B64URL.encode(y)),
    }
}

pub fn sign_rs256(msg: &[u8]) -> Vec<u8> {
    let sk = pkcs1v15::SigningKey::<Sha256>::new(RSA_KEY.clone());
    sk.sign(msg).to_vec()
}

pub fn sign_es256(msg: &[u8]) -> Vec<u8> {
    let sig: p256::ecdsa::Signature = EC_KEY.sign(msg);
    sig.to_bytes().to_vec()
}

/// Encodes and signs a token. The signature scheme follows `header.alg`;
/// anything else gets a junk signature.
pub fn mint(header: &Json, claims: &Json) -> String {
    let hdr = B64URL.encode(serde_json::to_vec(header).unwrap());
    let pld = B64URL.encode(serde_json::to_vec(claims).unwrap());
    let msg = format!("{hdr}.{pld}");
    let sig = match header.get("alg").and_then(|v| v.as_str()) {
        Some("RS256") => sign_rs256(msg.as_bytes()),
        Some("ES256") => sign_es256(msg.as_bytes()),
        _ => b"not-a-signature".to_vec(),
    };
    format!("{msg}.{}", B64URL.encode(sig))
}

pub fn platform_claims(aud: &str) -> Json {
    let now = now_ts();
    json!({
        "iss": "https://cloud.google.com/iap",
        "aud": aud,
        "sub": "accounts.google.com:1001",
        "email": "reporter@example.com",
        "iat": now,
        "exp": now + 600,
    })
}

pub fn federated_claims(aud: &str) -> Json {
    let now = now_ts();
    json!({
        "iss": "https://accounts.google.com",
        "aud": aud,
        "sub": "110169484474386276334",
        "email": "mobile.user@example.com",
        "iat": now,
        "exp": now + 3600,
    })
}

pub fn platform_token(kid: &str, claims: &Json) -> String {
    mint(&json!({"alg":"ES256","kid":kid,"typ":"JWT"}), claims)
}

pub fn federated_token(kid: &str, claims: &Json) -> String {
    mint(&json!({"alg":"RS256","kid":kid,"typ":"JWT"}), claims)
}

/// In-process key endpoint that counts fetches and can be switched to fail.
pub struct FakeKeySource {
    set: parking_lot::Mutex<Result<KeySet, FetchError>>,
    calls: AtomicUsize,
}

impl FakeKeySource {
    pub fn new(keys: Vec<KeyRecord>) -> Arc<Self> {
        Arc::new(Self { set: parking_lot::Mutex::new(Ok(KeySet::from_records(keys))), calls: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        let src = Self::new(vec![]);
        src.fail();
        src
    }

    pub fn fail(&self) {
        *self.set.lock() = Err(FetchError::Status { url: "fake://keys".into(), status: 503 });
    }

    pub fn serve(&self, keys: Vec<KeyRecord>) {
        *self.set.lock() = Ok(KeySet::from_records(keys));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeySource for FakeKeySource {
    fn fetch(&self, _deadline: Deadline) -> Result<KeySet, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.set.lock().clone()
    }

    fn endpoint(&self) -> &str {
        "fake://keys"
    }
}
