//! Combined payloads: several local notes merged into one transfer.
//!
//! A bundle is the header line followed by the notes joined with
//! [`NOTE_DELIM`]. Reads carry no flag saying whether a text is a bundle, so
//! [`decide_if_bundled`] sniffs for one and [`extract_latest_candidate`]
//! pulls the newest logical note back out.

/// First line of every payload produced by [`encode`].
pub const COMBINED_HEADER: &str = "// TextLinker Combined v1\n";

/// Separator between notes. Never produced by a plain paragraph break.
pub const NOTE_DELIM: &str = "\n\n---TEXTLINKER NOTE---\n\n";

/// Texts with more newlines than this are treated as a bundle even without
/// a header or delimiter.
pub const BUNDLE_NEWLINE_THRESHOLD: usize = 200;

pub fn encode<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut combined = String::from(COMBINED_HEADER);
    for (index, item) in items.into_iter().enumerate() {
        if index > 0 {
            combined.push_str(NOTE_DELIM);
        }
        combined.push_str(item.as_ref());
    }
    combined
}

/// Heuristic, not a format guarantee: a long single note full of blank
/// lines also qualifies.
pub fn decide_if_bundled(text: &str) -> bool {
    text.starts_with(COMBINED_HEADER)
        || text.contains(NOTE_DELIM)
        || text.matches('\n').count() > BUNDLE_NEWLINE_THRESHOLD
}

/// Newest logical item of a payload: the last delimited note when the body
/// has delimiters, otherwise its last paragraph. Always trimmed.
pub fn extract_latest_candidate(payload: &str) -> String {
    let body = strip_header(payload);
    if let Some((_, last)) = body.rsplit_once(NOTE_DELIM) {
        return last.trim().to_string();
    }
    last_paragraph(body).trim().to_string()
}

pub fn count_delimiters(text: &str) -> usize {
    strip_header(text).matches(NOTE_DELIM).count()
}

fn strip_header(payload: &str) -> &str {
    payload.strip_prefix(COMBINED_HEADER).unwrap_or(payload)
}

/// Text after the last run of two or more newlines.
fn last_paragraph(body: &str) -> &str {
    match body.rfind("\n\n") {
        Some(pos) => &body[pos + 2..],
        None => body,
    }
}
