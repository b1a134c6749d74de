/// Routes reachable without a token, matched on method and exact path.
pub(crate) const PUBLIC_ROUTES: &[(&str, &str)] = &[
    ("POST", "/api/register"),
    ("POST", "/api/login"),
    ("POST", "/api/payments/webhook"),
    ("GET", "/api/categories"),
    ("GET", "/api/categories/with_cards"),
    ("GET", "/health"),
];

/// Path prefixes served without a token for safe methods (uploaded photos).
pub(crate) const PUBLIC_GET_PREFIXES: &[&str] = &["/uploads/"];

/// Normalize a URL path by stripping the query string / fragment, percent-
/// decoding each segment, and resolving `.` and `..` to prevent bypass via
/// path traversal, including percent-encoded variants like `%2e%2e`.
fn normalize_path(path: &str) -> String {
    use percent_encoding::percent_decode_str;

    let path = path.split('?').next().unwrap_or(path);
    let path = path.split('#').next().unwrap_or(path);

    let mut segments: Vec<String> = Vec::new();
    for seg in path.split('/') {
        let decoded = percent_decode_str(seg).decode_utf8_lossy();
        match decoded.as_ref() {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s.to_owned()),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Returns `true` if the request may skip token validation.
pub fn is_public_route(method: &str, path: &str) -> bool {
    let normalized = normalize_path(path);

    if PUBLIC_ROUTES
        .iter()
        .any(|&(m, p)| m == method && p == normalized)
    {
        return true;
    }

    matches!(method, "GET" | "HEAD")
        && PUBLIC_GET_PREFIXES
            .iter()
            .any(|prefix| normalized.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_routes_match_method_and_path() {
        assert!(is_public_route("POST", "/api/register"));
        assert!(is_public_route("POST", "/api/login"));
        assert!(is_public_route("POST", "/api/payments/webhook"));
        assert!(is_public_route("GET", "/api/categories"));
        assert!(is_public_route("GET", "/api/categories/with_cards"));
        assert!(is_public_route("GET", "/health"));
    }

    #[test]
    fn writes_on_public_reads_need_a_token() {
        assert!(!is_public_route("POST", "/api/categories"));
        assert!(!is_public_route("DELETE", "/api/categories"));
        assert!(!is_public_route("GET", "/api/payments/webhook"));
    }

    #[test]
    fn protected_routes_are_not_public() {
        assert!(!is_public_route("GET", "/api/cards"));
        assert!(!is_public_route("GET", "/api/payments/generate"));
        assert!(!is_public_route("GET", "/api/profile"));
        assert!(!is_public_route("GET", "/uploads")); // no trailing slash
    }

    #[test]
    fn uploads_are_public_for_reads_only() {
        assert!(is_public_route("GET", "/uploads/cards/1/abc.png"));
        assert!(!is_public_route("PUT", "/uploads/cards/1/abc.png"));
    }

    #[test]
    fn traversal_cannot_reach_protected_routes() {
        assert!(!is_public_route("GET", "/uploads/../api/cards"));
        assert!(!is_public_route("GET", "/uploads/%2e%2e/api/profile"));
        // resolves to a real public route
        assert!(is_public_route("GET", "/api/cards/../categories"));
    }

    #[test]
    fn normalize_path_resolves_segments() {
        assert_eq!(normalize_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_path("/a/./b/c"), "/a/b/c");
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/api/login/"), "/api/login");
    }

    #[test]
    fn normalize_path_strips_query_and_fragment() {
        assert_eq!(normalize_path("/api/categories?x=1"), "/api/categories");
        assert_eq!(normalize_path("/health#top"), "/health");
    }
}
