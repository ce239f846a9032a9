//! Classification of stored media.
//!
//! The kind decides where a reference lives on disk and which retention
//! policy applies to it. The on-disk segment names are the stable
//! serialization; everything else matches exhaustively on the enum.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Periodic still uploads; purged every 24 h.
    Collected,
    /// Event-triggered uploads; purged every 24 h.
    Motion,
    /// User-pinned; never purged.
    Saved,
    /// System-synthesized timelapses; purged after the retention period.
    Generated,
    /// Sentinel for parse failures at the external boundary.
    Unknown,
}

impl MediaKind {
    /// Every legitimate kind, in the order directory scans walk them.
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Collected,
        MediaKind::Motion,
        MediaKind::Saved,
        MediaKind::Generated,
    ];

    /// The on-disk directory segment for this kind.
    pub fn segment(self) -> &'static str {
        match self {
            MediaKind::Collected => "collected",
            MediaKind::Motion => "motion",
            MediaKind::Saved => "pinned",
            MediaKind::Generated => "generated",
            MediaKind::Unknown => "",
        }
    }

    pub fn from_segment(segment: &str) -> MediaKind {
        match segment {
            "collected" => MediaKind::Collected,
            "motion" => MediaKind::Motion,
            "pinned" => MediaKind::Saved,
            "generated" => MediaKind::Generated,
            _ => MediaKind::Unknown,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}
