//! Media URL helpers: classification and proxy routing.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Extensions treated as video containers
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv", "flv"];

/// HLS playlist suffix
const HLS_SUFFIX: &str = ".m3u8";

/// Path of the proxy endpoint, relative to the proxy base
const PROXY_PATH: &str = "/proxy-video";

/// Characters left unescaped in a URL component (same set as `encodeURIComponent`)
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Decide whether frame extraction is worth attempting for `url`.
///
/// True for a known video extension, an HLS playlist, or any URL mentioning
/// "video". Query strings and fragments are ignored for the extension test.
pub fn is_media_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if lower.contains("video") {
        return true;
    }

    let path = strip_query(&lower);
    if path.ends_with(HLS_SUFFIX) {
        return true;
    }

    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) => VIDEO_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Route `url` through the same-origin media proxy:
/// `{base}/proxy-video?url={percent-encoded url}`
pub fn proxied_url(proxy_base: &str, url: &str) -> String {
    format!(
        "{}{}?url={}",
        proxy_base.trim_end_matches('/'),
        PROXY_PATH,
        utf8_percent_encode(url, COMPONENT)
    )
}

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
