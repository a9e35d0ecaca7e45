//! Time-windowed one-time codes over a shared secret, used solely to gate
//! device remote-connection link issuance. HMAC-SHA256 over the window
//! counter with RFC 4226 dynamic truncation to six digits.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn code_at(secret: &[u8], counter: u64) -> u32 {
    // new_from_slice only fails on an empty-key edge the callers rule out
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);
    bin % 1_000_000
}

/// Accepts the current window and the immediately previous one, so a code
/// typed near a window boundary still validates.
pub fn verify(secret: &str, interval_s: u64, code: &str, now_unix: u64) -> bool {
    if secret.is_empty() || interval_s == 0 {
        return false;
    }
    let counter = now_unix / interval_s;
    [counter, counter.saturating_sub(1)]
        .iter()
        .any(|c| format!("{:06}", code_at(secret.as_bytes(), *c)) == code)
}
