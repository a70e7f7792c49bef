//! HMAC-SHA256 signing over the base64-decoded account key, per spec section 4.1.
//!
//! Generalized from the teacher's `hmac_256` (which decoded a `&str` secret on every
//! call) to operate on the already-decoded key bytes the rest of the pipeline carries
//! around, so the raw key string is decoded exactly once, at config build time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes `base64(HMAC-SHA256(key_bytes, data))`.
///
/// `key_bytes` must already be base64-decoded (see `CredentialSource::SharedKey`);
/// this function never decodes — decoding happens once, at config build time.
pub fn sign(key_bytes: &[u8], data: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key_bytes).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}
