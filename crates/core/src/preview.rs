//! Preview URL resolution.

/// Pick the URL to open for a draft preview.
///
/// Uses the server-provided URL when there is one, otherwise derives the
/// site-relative preview route from the slug and, when known, the draft id.
pub fn resolve_preview_url(server_url: Option<&str>, slug: &str, draft_id: Option<&str>) -> String {
    if let Some(url) = server_url.map(str::trim).filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    match draft_id.map(str::trim).filter(|d| !d.is_empty()) {
        Some(id) => format!("/preview/{slug}?draftId={}", urlencoding::encode(id)),
        None => format!("/preview/{slug}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_url_wins() {
        let url = resolve_preview_url(Some("https://site.test/p/abc"), "home", Some("d-1"));
        assert_eq!(url, "https://site.test/p/abc");
    }

    #[test]
    fn falls_back_to_draft_route() {
        assert_eq!(
            resolve_preview_url(None, "about-us", Some("7f3a")),
            "/preview/about-us?draftId=7f3a"
        );
    }

    #[test]
    fn falls_back_to_slug_route() {
        assert_eq!(resolve_preview_url(Some("  "), "about-us", None), "/preview/about-us");
    }

    #[test]
    fn draft_id_is_encoded() {
        assert_eq!(
            resolve_preview_url(None, "home", Some("a b&c")),
            "/preview/home?draftId=a%20b%26c"
        );
        assert_eq!(
            resolve_preview_url(None, "home", Some("مسودة/1?x=#")),
            "/preview/home?draftId=%D9%85%D8%B3%D9%88%D8%AF%D8%A9%2F1%3Fx%3D%23"
        );
    }
}
