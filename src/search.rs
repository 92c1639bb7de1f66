use once_cell::sync::Lazy;
use regex::Regex;

/// Characters of context kept on each side of the first match.
const SNIPPET_WINDOW: usize = 40;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Strips markup so snippets never carry HTML fragments into the response.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, " ").to_string()
}

/// Locates the first case-insensitive occurrence of `query` in the
/// tag-stripped content and returns a window of up to `SNIPPET_WINDOW`
/// characters on each side, with ellipses where the window is clipped.
/// Returns `None` when the query only matched the title.
pub fn build_snippet(content: &str, query: &str) -> Option<String> {
    if query.is_empty() {
        return None;
    }

    let plain = strip_tags(content);
    let chars: Vec<char> = plain.chars().collect();
    let needle: Vec<char> = query.to_lowercase().chars().collect();

    let start = find_ci(&chars, &needle)?;
    let end = start + needle.len();

    let window_start = start.saturating_sub(SNIPPET_WINDOW);
    let window_end = (end + SNIPPET_WINDOW).min(chars.len());

    let mut snippet = String::new();
    if window_start > 0 {
        snippet.push_str("...");
    }
    snippet.extend(&chars[window_start..window_end]);
    if window_end < chars.len() {
        snippet.push_str("...");
    }

    Some(snippet.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn find_ci(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }

    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| h.to_lowercase().eq(n.to_lowercase()))
    })
}
