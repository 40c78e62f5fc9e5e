//! Attachment entity definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A typed reference to stored media, bound to exactly one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub message_id: i64,
    /// Index within the owning message's submitted attachment list.
    pub position: i64,
    pub kind: AttachmentKind,
    pub link: String,
}

/// Attachment as submitted with a new message, before the store assigns ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub kind: AttachmentKind,
    pub link: String,
}

impl NewAttachment {
    pub fn new(kind: AttachmentKind, link: impl Into<String>) -> Self {
        Self {
            kind,
            link: link.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
    Video,
    Audio,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::File => "file",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown attachment kind: {0}")]
pub struct UnknownAttachmentKind(pub String);

impl FromStr for AttachmentKind {
    type Err = UnknownAttachmentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AttachmentKind::Image),
            "file" => Ok(AttachmentKind::File),
            "video" => Ok(AttachmentKind::Video),
            "audio" => Ok(AttachmentKind::Audio),
            other => Err(UnknownAttachmentKind(other.to_string())),
        }
    }
}
