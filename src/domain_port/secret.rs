use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// 32 bytes = 256 bits of entropy.
pub const SECRET_BYTES: usize = 32;

/// Opaque refresh secret: OS randomness, URL-safe base64 without padding.
pub fn generate_secret() -> String {
    let mut buf = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
