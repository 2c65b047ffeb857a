use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of a pairing produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    App,
    Web,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::App => "app",
            Origin::Web => "web",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text item held by the relay under its token.
///
/// `consumed` flips to true the first time an unread-web read returns the
/// message and never flips back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub origin: Origin,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
}

/// A note from the client's local store, or one about to be saved there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalItem {
    pub title: String,
    pub content: String,
}
