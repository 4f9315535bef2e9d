//! Master-key request signing.
//!
//! Every request carries an `authorization` header built from an
//! HMAC-SHA256 over
//!
//! ```text
//! {verb}\n{resource type}\n{resource link}\n{date}\n\n
//! ```
//!
//! where verb, resource type and date are lower-cased and the resource link
//! keeps its original case. The key is the base64-decoded account master
//! key; the signature is base64-encoded and the whole token URL-encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::CosmosError;

type HmacSha256 = Hmac<Sha256>;

/// A decoded master key, ready to sign.
#[derive(Clone)]
pub struct MasterKey {
    mac: HmacSha256,
}

impl MasterKey {
    /// Decode a base64 master key.
    pub fn from_base64(encoded: &str) -> Result<Self, CosmosError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CosmosError::InvalidKey(e.to_string()))?;
        let mac = HmacSha256::new_from_slice(&bytes)
            .map_err(|e| CosmosError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Base64 HMAC-SHA256 signature of `payload`.
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// The exact text that gets signed for one request.
pub fn string_to_sign(verb: &str, resource_type: &str, resource_link: &str, date: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    )
}

/// URL-encoded `authorization` header value.
pub fn authorization_token(
    key: &MasterKey,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> String {
    let signature = key.sign(&string_to_sign(verb, resource_type, resource_link, date));
    urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned()
}

/// Current time in RFC 1123 form, as expected by `x-ms-date`.
pub fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "dGVzdC1tYXN0ZXIta2V5"; // "test-master-key"

    #[test]
    fn payload_lowercases_everything_but_the_link() {
        let date = "Tue, 01 Nov 1994 08:12:31 GMT";
        let payload = string_to_sign("GET", "DOCS", "dbs/MyDb/colls/Trades", date);
        assert_eq!(
            payload,
            "get\ndocs\ndbs/MyDb/colls/Trades\ntue, 01 nov 1994 08:12:31 gmt\n\n"
        );
    }

    #[test]
    fn signature_matches_direct_hmac() {
        let key = MasterKey::from_base64(KEY).unwrap();
        let mut mac = HmacSha256::new_from_slice(b"test-master-key").unwrap();
        mac.update(b"abc");
        let expected = STANDARD.encode(mac.finalize().into_bytes());
        assert_eq!(key.sign("abc"), expected);
        // 32-byte digest → 44 base64 chars
        assert_eq!(expected.len(), 44);
    }

    #[test]
    fn token_is_url_encoded_master_token() {
        let key = MasterKey::from_base64(KEY).unwrap();
        let token = authorization_token(&key, "post", "dbs", "", "Tue, 01 Nov 1994 08:12:31 GMT");
        assert!(token.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"));
        let decoded = urlencoding::decode(&token).unwrap();
        let sig = decoded.strip_prefix("type=master&ver=1.0&sig=").unwrap();
        let payload = string_to_sign("post", "dbs", "", "Tue, 01 Nov 1994 08:12:31 GMT");
        let expected = key.sign(&payload);
        assert_eq!(sig, expected);
    }

    #[test]
    fn invalid_key_rejected() {
        assert!(matches!(MasterKey::from_base64("not base64!"), Err(CosmosError::InvalidKey(_))));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = MasterKey::from_base64(KEY).unwrap();
        assert_eq!(format!("{key:?}"), "MasterKey(<redacted>)");
    }

    #[test]
    fn date_is_rfc1123() {
        let d = rfc1123_now();
        assert!(d.ends_with(" GMT"));
        assert_eq!(d.len(), "Tue, 01 Nov 1994 08:12:31 GMT".len());
    }
}
