//! Seams to the host app: where local notes live and how tokens travel as QR
//! codes. Implementations belong to the platform layer.

use textlinker_types::char_len;
use textlinker_types::models::LocalItem;

/// Title given to received text whose first line is unusable as one.
pub const DEFAULT_RECEIVED_TITLE: &str = "Text from Website";

const MAX_TITLE_CHARS: usize = 50;

/// Local note storage owned by the app.
pub trait LocalItemStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn list_local_items(&self) -> Result<Vec<LocalItem>, Self::Error>;

    fn save_item(&self, item: LocalItem) -> Result<(), Self::Error>;
}

/// Converts tokens to and from scannable images.
pub trait QrCodec {
    type Image;
    type Error: std::error::Error + Send + Sync + 'static;

    fn encode(&self, token: &str) -> Result<Self::Image, Self::Error>;

    /// Raw scanned payload. Pass it through [`token_from_scan`].
    fn decode(&self, image: &Self::Image) -> Result<String, Self::Error>;
}

/// The token carried by a scanned value: everything after `token=` when the
/// value is a link, otherwise the value itself.
pub fn token_from_scan(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.split_once("token=") {
        Some((_, token)) => token,
        None => raw,
    }
}

/// Wrap received text as a local note.
pub fn received_item(text: &str) -> LocalItem {
    let first_line = text.lines().next().unwrap_or("").trim();
    let title = if !first_line.is_empty() && char_len(first_line) <= MAX_TITLE_CHARS {
        first_line.to_string()
    } else {
        DEFAULT_RECEIVED_TITLE.to_string()
    };
    LocalItem {
        title,
        content: text.to_string(),
    }
}
