//! Token extraction from requests and `Set-Cookie` values for responses.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

use super::config::CookieSettings;

/// Path of the access-token cookie.
pub const ACCESS_COOKIE_PATH: &str = "/";
/// Path of the refresh-token cookie; covers the refresh and logout endpoints.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Read a token from `Authorization: Bearer <token>`.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Read cookie `name` from every `Cookie` header on the request.
#[must_use]
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == name && !val.is_empty()).then(|| val.to_string())
        })
}

/// Prefer the bearer header, fall back to the access cookie.
#[must_use]
pub fn extract_access_token(headers: &HeaderMap, cookies: &CookieSettings) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_cookie(headers, cookies.name()))
}

/// Build a cookie carrying `token` for `max_age_seconds`.
///
/// # Errors
/// Returns an error if the token or cookie settings contain characters not
/// allowed in a header value.
pub fn token_cookie(
    cookies: &CookieSettings,
    name: &str,
    path: &str,
    token: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&cookie_string(
        cookies,
        name,
        path,
        token,
        max_age_seconds.max(0),
    ))
}

/// Build an expired cookie that makes the browser drop `name`.
///
/// # Errors
/// Returns an error if the cookie settings contain characters not allowed in a
/// header value.
pub fn clear_cookie(
    cookies: &CookieSettings,
    name: &str,
    path: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&cookie_string(cookies, name, path, "", 0))
}

fn cookie_string(
    cookies: &CookieSettings,
    name: &str,
    path: &str,
    value: &str,
    max_age_seconds: i64,
) -> String {
    let mut cookie = format!("{name}={value}; Path={path}; Max-Age={max_age_seconds}");
    if let Some(domain) = cookies.domain() {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if cookies.http_only() {
        cookie.push_str("; HttpOnly");
    }
    if cookies.secure() {
        cookie.push_str("; Secure");
    }
    cookie.push_str("; SameSite=");
    cookie.push_str(cookies.same_site());
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn bearer_token_is_trimmed_and_case_tolerant() {
        assert_eq!(
            extract_bearer_token(&headers(&[("authorization", "Bearer  abc ")])),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_bearer_token(&headers(&[("authorization", "bearer abc")])),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_bearer_token(&headers(&[("authorization", "Basic abc")])),
            None
        );
        assert_eq!(
            extract_bearer_token(&headers(&[("authorization", "Bearer ")])),
            None
        );
    }

    #[test]
    fn cookie_lookup_scans_all_headers() {
        let map = headers(&[("cookie", "a=1; theme=dark"), ("cookie", "jwt=tok; b=2")]);
        assert_eq!(extract_cookie(&map, "jwt"), Some("tok".to_string()));
        assert_eq!(extract_cookie(&map, "theme"), Some("dark".to_string()));
        assert_eq!(extract_cookie(&map, "missing"), None);
        assert_eq!(extract_cookie(&headers(&[("cookie", "jwt=")]), "jwt"), None);
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let cookies = CookieSettings::default();
        let map = headers(&[("authorization", "Bearer header"), ("cookie", "jwt=cookie")]);
        assert_eq!(
            extract_access_token(&map, &cookies),
            Some("header".to_string())
        );
        let map = headers(&[("cookie", "jwt=cookie")]);
        assert_eq!(
            extract_access_token(&map, &cookies),
            Some("cookie".to_string())
        );
    }

    #[test]
    fn secure_cookie_format() -> Result<(), InvalidHeaderValue> {
        let cookies = CookieSettings::default().with_domain(Some("example.com".to_string()));
        let value = token_cookie(&cookies, "jwt", ACCESS_COOKIE_PATH, "tok", 120)?;
        assert_eq!(
            value.to_str().ok(),
            Some("jwt=tok; Path=/; Max-Age=120; Domain=example.com; HttpOnly; Secure; SameSite=None")
        );
        Ok(())
    }

    #[test]
    fn insecure_cookie_uses_lax_and_clear_expires() -> Result<(), InvalidHeaderValue> {
        let cookies = CookieSettings::default()
            .with_secure(false)
            .with_http_only(false);
        let value = clear_cookie(&cookies, "refresh_token", REFRESH_COOKIE_PATH)?;
        assert_eq!(
            value.to_str().ok(),
            Some("refresh_token=; Path=/api/auth; Max-Age=0; SameSite=Lax")
        );
        Ok(())
    }
}
