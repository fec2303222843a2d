//! One-shot flash messages carried in a signed cookie.
//!
//! The cookie value is `base64url(message) "." base64url(hmac_sha256)`,
//! keyed by the configured secret. A redirect sets it; the next page view
//! reads it and clears it. A cookie whose signature does not verify is
//! treated as absent.

use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const FLASH_COOKIE: &str = "svg2stl_flash";

/// Browsers cap cookies around 4 KiB; tool diagnostics can be longer.
const MAX_MESSAGE_CHARS: usize = 1500;

/// HMAC key for flash cookies.
#[derive(Clone)]
pub struct FlashKey {
    mac: HmacSha256,
}

impl std::fmt::Debug for FlashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FlashKey(<redacted>)")
    }
}

impl FlashKey {
    pub fn new(secret: &str) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret.as_bytes())?,
        })
    }

    /// Encode and sign `message` as a cookie value.
    pub fn sign(&self, message: &str) -> String {
        let message = truncate(message, MAX_MESSAGE_CHARS);
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        let signature = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(message.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Decode a cookie value, returning the message if the signature holds.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (payload, signature) = value.split_once('.')?;
        let message = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(&message);
        mac.verify_slice(&signature).ok()?;
        String::from_utf8(message).ok()
    }
}

/// `303 See Other` to `location`, carrying `message` for the next page view.
pub fn redirect_with_flash(key: &FlashKey, location: &'static str, message: &str) -> Response {
    let cookie = format!(
        "{FLASH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        key.sign(message)
    );
    let mut response = StatusCode::SEE_OTHER.into_response();
    let headers = response.headers_mut();
    headers.insert(LOCATION, HeaderValue::from_static(location));
    // base64url plus fixed attributes is always a valid header value
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(SET_COOKIE, value);
    }
    response
}

/// Read the pending flash message, if any and if authentic.
pub fn take_flash(key: &FlashKey, headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == FLASH_COOKIE)
        .and_then(|(_, value)| key.verify(value))
}

/// `Set-Cookie` value that deletes the flash cookie.
pub fn clear_flash_cookie() -> HeaderValue {
    HeaderValue::from_static("svg2stl_flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
