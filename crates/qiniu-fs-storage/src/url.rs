//! Download URL construction

use qiniu_fs_core::Protocol;

/// `<protocol>://<domain>/<path>` with spaces in the path encoded as `%20`.
///
/// No other character is escaped.
pub fn build_url(protocol: Protocol, domain: &str, path: &str) -> String {
    format!("{}://{}/{}", protocol, domain, path.replace(' ', "%20"))
}

/// Append a processing query to a URL.
///
/// Uses `?` when the URL has no query string yet and `&` when it does. A URL
/// ending in `?` gets the query appended directly.
pub fn append_query(url: &str, query: &str) -> String {
    match url.rfind('?') {
        Some(pos) if pos > 0 => {
            if pos == url.len() - 1 {
                format!("{}{}", url, query)
            } else {
                format!("{}&{}", url, query)
            }
        }
        _ => format!("{}?{}", url, query),
    }
}

const THUMBNAIL_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/tiff",
    "image/bmp",
];

/// Whether the image service can render thumbnails for this mimetype.
pub fn can_thumbnail(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    THUMBNAIL_MIME_TYPES.contains(&mime.as_str())
}
