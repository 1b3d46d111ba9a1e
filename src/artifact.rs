use serde::{Deserialize, Serialize};
use std::fmt;

/// The three generated documents, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Structure,
    Models,
    OtherValues,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Structure,
        ArtifactKind::Models,
        ArtifactKind::OtherValues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Structure => "structure",
            ArtifactKind::Models => "models",
            ArtifactKind::OtherValues => "other_values",
        }
    }

    /// Document name inside the artifacts folder.
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Structure => "structure.json",
            ArtifactKind::Models => "models.json",
            ArtifactKind::OtherValues => "other_values.json",
        }
    }

    /// Artifacts that must already exist for this one to be generated.
    pub fn dependencies(&self) -> &'static [ArtifactKind] {
        match self {
            ArtifactKind::Structure => &[],
            ArtifactKind::Models => &[ArtifactKind::Structure],
            ArtifactKind::OtherValues => &[ArtifactKind::Structure, ArtifactKind::Models],
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
