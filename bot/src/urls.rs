/// URL detection for command arguments.
///
/// The bot hands whatever URL it finds to the downloader, so a generic
/// http(s) matcher is all that is needed here.
use once_cell::sync::Lazy;
use regex::Regex;

/// Generic URL pattern to catch any http/https link.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>\[\](){},"']+"#).unwrap()
});

/// Extract the first http(s) URL from the text, if any.
pub fn detect_first_url(text: &str) -> Option<String> {
    URL_RE.find(text).map(|m| m.as_str().to_string())
}
