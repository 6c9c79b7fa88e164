//! Contention mode tag.

use crate::result::SusurroError;
use serde::{Deserialize, Serialize};

/// Memory operation a lane performs to generate bus contention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentionMode {
    /// Streaming loads from the lane's read buffer
    #[default]
    Read,
    /// Streaming stores of zeroed vector words into the lane's write buffer
    Write,
    /// Interleaved streaming load/store from read buffer to write buffer
    Copy,
}

impl ContentionMode {
    /// All modes, in canonical order
    pub const ALL: [Self; 3] = [Self::Read, Self::Write, Self::Copy];

    /// Canonical uppercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Copy => "COPY",
        }
    }

    /// Whether a burst in this mode moves each byte twice (read and write)
    #[must_use]
    pub fn is_bidirectional(&self) -> bool {
        matches!(self, Self::Copy)
    }
}

impl std::fmt::Display for ContentionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentionMode {
    type Err = SusurroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "READ" => Ok(Self::Read),
            "WRITE" => Ok(Self::Write),
            "COPY" => Ok(Self::Copy),
            _ => Err(SusurroError::invalid_argument(format!(
                "unknown contention mode: {s:?} (expected READ, WRITE or COPY)"
            ))),
        }
    }
}
