//! Storage asset URLs
//!
//! The backend returns avatars and attachments as paths relative to its
//! public storage root (`avatars/7.png`); some older records already hold an
//! absolute URL.

/// Absolute URL for a stored asset, or `None` for an empty path.
pub fn resolve_storage_url(storage_base: &str, path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("data:") {
        return Some(path.to_string());
    }
    Some(format!(
        "{}/{}",
        storage_base.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_is_joined() {
        assert_eq!(
            resolve_storage_url("https://api.josgen.org/storage/", "/avatars/7.png").as_deref(),
            Some("https://api.josgen.org/storage/avatars/7.png")
        );
        assert_eq!(
            resolve_storage_url("https://api.josgen.org/storage", "avatars/7.png").as_deref(),
            Some("https://api.josgen.org/storage/avatars/7.png")
        );
    }

    #[test]
    fn absolute_url_passes_through() {
        let url = "https://cdn.example.org/a.png";
        assert_eq!(resolve_storage_url("https://api.josgen.org/storage", url).as_deref(), Some(url));
    }

    #[test]
    fn empty_path_has_no_url() {
        assert_eq!(resolve_storage_url("https://api.josgen.org/storage", "  "), None);
    }
}
