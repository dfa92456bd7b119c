//! Flash messages carried across a redirect in a short-lived cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use tracing::warn;
use warbler_types::api::Flash;

pub const FLASH_COOKIE: &str = "flash";

/// A flash raised while building an error response, which has no access to
/// the request's cookies. The session layer moves it into the `flash`
/// cookie after the request's pending flashes.
#[derive(Debug, Clone)]
pub struct PendingFlash(pub Flash);

/// Queue `flash` for the next rendered page.
pub fn push(jar: CookieJar, flash: Flash) -> CookieJar {
    let mut flashes = read(&jar);
    flashes.push(flash);

    let encoded = match serde_json::to_vec(&flashes) {
        Ok(json) => B64.encode(json),
        Err(e) => {
            warn!("dropping flash that failed to encode: {}", e);
            return jar;
        }
    };

    jar.add(
        Cookie::build((FLASH_COOKIE, encoded))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Drain queued flashes, clearing the cookie if there was anything to show.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<Flash>) {
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, Vec::new());
    }
    let flashes = read(&jar);
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), flashes)
}

fn read(jar: &CookieJar) -> Vec<Flash> {
    jar.get(FLASH_COOKIE)
        .and_then(|cookie| B64.decode(cookie.value()).ok())
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warbler_types::api::FlashCategory;

    #[test]
    fn test_push_appends_and_take_drains() {
        let jar = push(CookieJar::new(), Flash::danger("first"));
        let jar = push(jar, Flash::info("second"));

        let (jar, flashes) = take(jar);
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].category, FlashCategory::Danger);
        assert_eq!(flashes[1].message, "second");
        assert!(jar.get(FLASH_COOKIE).is_none());
    }

    #[test]
    fn test_garbage_cookie_reads_as_empty() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "%%not-base64%%"));
        let (_, flashes) = take(jar);
        assert!(flashes.is_empty());
    }
}
