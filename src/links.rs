//! Share-link extraction from free-form message text.

/// Characters that end a URL when they trail it.
const TRAILING_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '\'', '"',
];

/// First `http://` or `https://` URL in `text`.
///
/// The URL ends at whitespace or the first non-ASCII character, and trailing
/// punctuation is dropped.
#[must_use]
pub fn extract_url(text: &str) -> Option<String> {
    let start = find_scheme(text)?;
    let tail = &text[start..];
    let end = tail
        .char_indices()
        .find(|(_, c)| c.is_whitespace() || !c.is_ascii() || c.is_ascii_control())
        .map_or(tail.len(), |(index, _)| index);

    let url = tail[..end].trim_end_matches(TRAILING_PUNCTUATION);
    let has_host = url
        .split_once("://")
        .is_some_and(|(_, rest)| !rest.is_empty());
    has_host.then(|| url.to_owned())
}

/// Requirement text of a share message: `text` without `url`, whitespace
/// collapsed.
#[must_use]
pub fn extract_requirement(text: &str, url: &str) -> String {
    let without_url = if url.is_empty() {
        text.to_owned()
    } else {
        text.replacen(url, " ", 1)
    };
    without_url.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn find_scheme(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    [lower.find("https://"), lower.find("http://")]
        .into_iter()
        .flatten()
        .min()
}
