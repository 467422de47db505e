// Redirect targets and post-login return paths
//
// The two redirect destinations are fixed. The return path rides along in the
// login redirect as the `redirect` query parameter and is only ever honored
// when it is a same-origin path.

use std::fmt;
use url::form_urlencoded;

/// Login entry point.
pub const LOGIN_PATH: &str = "/login";

/// Destination for authenticated users who lack the required role.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Query parameter carrying the path to return to after login.
pub const RETURN_PARAM: &str = "redirect";

/// A path that is safe to navigate to after login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnPath(String);

impl ReturnPath {
    /// The application root, used whenever a return path is missing or unsafe.
    pub fn root() -> Self {
        ReturnPath("/".to_string())
    }

    /// Accept `raw` only if it is a local absolute path.
    ///
    /// Rejected (mapped to `/`): empty input, anything not starting with a
    /// single `/`, protocol-relative `//host` and `/\host` forms, control
    /// characters, and paths pointing back at the login page. Fragments are
    /// dropped.
    pub fn sanitize(raw: &str) -> Self {
        let raw = raw.trim();
        let raw = raw.split('#').next().unwrap_or_default();

        let local = raw.starts_with('/')
            && !raw.starts_with("//")
            && !raw.starts_with("/\\")
            && !raw.chars().any(|c| c.is_control());
        if !local {
            return Self::root();
        }

        let candidate = ReturnPath(raw.to_string());
        let path = candidate.path();
        if path == LOGIN_PATH || path.starts_with("/login/") {
            return Self::root();
        }
        candidate
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path without its query string.
    pub fn path(&self) -> &str {
        self.0.split('?').next().unwrap_or(&self.0)
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl fmt::Display for ReturnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `/login?redirect=<encoded path>`
pub fn login_location(return_to: &ReturnPath) -> String {
    let encoded: String = form_urlencoded::byte_serialize(return_to.as_str().as_bytes()).collect();
    format!("{}?{}={}", LOGIN_PATH, RETURN_PARAM, encoded)
}

/// Extract and sanitize the return path from a login URL's query string.
pub fn return_path_from_query(query: Option<&str>) -> ReturnPath {
    query
        .and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == RETURN_PARAM)
                .map(|(_, value)| ReturnPath::sanitize(&value))
        })
        .unwrap_or_else(ReturnPath::root)
}
