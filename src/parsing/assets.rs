use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static ASSET_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:img|link|script|source|input)\b[^>]*?\s(?:src|href)\s*=\s*["']([^"']+)["']"#)
        .expect("asset reference pattern is valid")
});

/// Companion file suffixes of an inline XBRL filing, relative to the primary
/// document's stem (`amzn-20241031.htm` → `amzn-20241031_lab.xml`).
pub const XBRL_COMPANION_SUFFIXES: &[&str] = &[
    ".xsd", "_cal.xml", "_def.xml", "_lab.xml", "_pre.xml", "_htm.xml",
];

/// Collects the relative asset references (images, stylesheets, scripts) of an
/// HTML document, in document order and without duplicates.
///
/// Absolute URLs, protocol-relative URLs, `data:` URIs and fragment links are
/// skipped; query strings and fragments are stripped.
pub fn extract_asset_refs(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for caps in ASSET_REF.captures_iter(html) {
        let raw = caps[1].trim().replace("&amp;", "&");
        if !is_relative_ref(&raw) {
            continue;
        }
        let path = raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_start_matches("./")
            .to_string();
        if path.is_empty() || path.ends_with('/') {
            continue;
        }
        if seen.insert(path.clone()) {
            refs.push(path);
        }
    }

    refs
}

fn is_relative_ref(reference: &str) -> bool {
    if reference.is_empty() || reference.starts_with('#') || reference.starts_with("//") {
        return false;
    }
    // A scheme is letters/digits/+/-/. before the first ':' and before any '/'.
    match reference.find(':') {
        Some(colon) => reference[..colon].contains('/'),
        None => true,
    }
}

/// Whether a primary document name is markup the renderer can load.
pub fn is_renderable_markup(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".htm") || lower.ends_with(".html") || lower.ends_with(".xhtml")
}
