//! `Set-Cookie` values for the session and CSRF cookies.

use meterdeck_core::csrf::{CSRF_COOKIE, CSRF_MAX_AGE_HOURS};

pub const SESSION_COOKIE: &str = "meterdeck_session";

/// HttpOnly session cookie; script never needs to read it.
pub fn session_cookie(token: &str, max_age: chrono::Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        max_age.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expire the session cookie immediately.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// CSRF cookie. Readable by script so it can be echoed in the header.
pub fn csrf_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{CSRF_COOKIE}={token}; SameSite=Strict; Path=/; Max-Age={}",
        CSRF_MAX_AGE_HOURS * 3600
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
