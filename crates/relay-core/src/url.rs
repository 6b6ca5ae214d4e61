//! Upstream URL composition

/// Join a provider base URL with an endpoint path
///
/// Strips trailing slashes from the base and leading slashes from the path
/// so the result always contains exactly one `/` at the seam, regardless of
/// how the admin entered the base URL.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
