//! Read-only MIME type <-> file extension table.
//!
//! Lookups never fail: unknown extensions and MIME types yield `None`.

use std::path::Path;

/// MIME type and its extensions, preferred extension first.
const MIME_TABLE: &[(&str, &[&str])] = &[
    ("application/gzip", &["gz"]),
    ("application/json", &["json", "map"]),
    ("application/octet-stream", &["bin"]),
    ("application/pdf", &["pdf"]),
    ("application/wasm", &["wasm"]),
    ("application/xml", &["xml"]),
    ("application/zip", &["zip"]),
    ("audio/mpeg", &["mpga", "mp2", "mp3"]),
    ("audio/ogg", &["oga", "ogg", "opus"]),
    ("audio/wav", &["wav"]),
    ("font/woff", &["woff"]),
    ("font/woff2", &["woff2"]),
    ("image/avif", &["avif"]),
    ("image/bmp", &["bmp"]),
    ("image/gif", &["gif"]),
    ("image/jpeg", &["jpeg", "jpg", "jpe"]),
    ("image/png", &["png"]),
    ("image/svg+xml", &["svg", "svgz"]),
    ("image/tiff", &["tif", "tiff"]),
    ("image/webp", &["webp"]),
    ("image/x-icon", &["ico"]),
    ("text/css", &["css"]),
    ("text/csv", &["csv"]),
    ("text/html", &["html", "htm", "shtml"]),
    ("text/javascript", &["js", "mjs"]),
    ("text/markdown", &["md", "markdown"]),
    ("text/plain", &["txt", "text", "conf", "log"]),
    ("video/mp4", &["mp4", "mp4v", "mpg4"]),
    ("video/mpeg", &["mpeg", "mpg", "mpe"]),
    ("video/webm", &["webm"]),
];

/// MIME type for an extension, with or without the leading dot.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        return None;
    }

    MIME_TABLE
        .iter()
        .find(|(_, extensions)| {
            extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        })
        .map(|(mime, _)| *mime)
}

/// Preferred extension (without dot) for a MIME type. Parameters are ignored.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();

    MIME_TABLE
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .and_then(|(_, extensions)| extensions.first().copied())
}

/// MIME type implied by the extension of a blob key such as `a/b/photo.png`.
pub fn mime_for_key(key: &str) -> Option<&'static str> {
    Path::new(key)
        .extension()
        .and_then(|extension| extension.to_str())
        .and_then(mime_for_extension)
}
