pub mod api;
pub mod models;

/// Texts at or above this many characters are refused on upload and on read.
pub const MAX_TEXT_CHARS: usize = 200_000;

/// Responses carrying more messages than this are treated as malformed.
pub const MAX_MESSAGES_PER_READ: usize = 50;

/// Default split size used by clients for `/upload-chunk`.
pub const DEFAULT_CHUNK_CHARS: usize = 8000;

/// Shorten a token for log output: `abc***xyz`, or `***` for short tokens.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 6 {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{}***{}", head, tail)
    } else {
        "***".to_string()
    }
}

/// Length in characters, the unit every size limit is expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
