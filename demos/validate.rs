use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine as _};
use bearer_principal::{
    HttpIntrospector, KeyRecord, KeySet, SessionIdentity, SessionTokens, StaticKeySource, TokenValidationService,
    ValidatorConfig,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let sk = RsaPrivateKey::new(&mut rng, 2048)?;
    let pk = sk.to_public_key();

    let record = KeyRecord {
        kid: "demo".into(),
        kty: "RSA".into(),
        alg: Some("RS256".into()),
        use_: Some("sig".into()),
        n: Some(B64URL.encode(pk.n().to_bytes_be())),
        e: Some(B64URL.encode(pk.e().to_bytes_be())),
        crv: None,
        x: None,
        y: None,
    };

    let config = ValidatorConfig::default().with_client_ids("demo-web,demo-ios");
    let service = TokenValidationService::with_sources(
        config.clone(),
        Arc::new(StaticKeySource(KeySet::from_records(Vec::<KeyRecord>::new()))),
        Arc::new(StaticKeySource(KeySet::from_records([record]))),
        Box::new(HttpIntrospector::new(&config.introspection_url)),
    );

    let now = bearer_principal::now_ts();
    let header = json!({"alg":"RS256","kid":"demo","typ":"JWT"});
    let payload = json!({
        "iss": "https://accounts.google.com",
        "aud": "demo-ios",
        "sub": "110169484474386276334",
        "email": "demo@example.com",
        "iat": now,
        "exp": now + 600,
    });
    let hdr = B64URL.encode(serde_json::to_string(&header)?);
    let pld = B64URL.encode(serde_json::to_string(&payload)?);
    let msg = format!("{}.{}", hdr, pld);
    let sig = SigningKey::<Sha256>::new(sk).sign(msg.as_bytes());
    let jwt = format!("{}.{}", msg, B64URL.encode(sig.to_vec()));

    let principal = service.validate(&jwt)?;
    println!("verified {} ({})", principal.email(), principal.subject());

    let sessions = SessionTokens::new(b"demo-secret-demo-secret-demo-secret!")?;
    let session = sessions.issue(&SessionIdentity::from_principal(&principal, "reporter"))?;
    let claims = sessions.verify(&session)?;
    println!("session for {} as {}, handle {}", claims.email, claims.role, claims.jti);
    Ok(())
}
