//! Module generation status state machine
//!
//! ```text
//! NotStarted
//!   ↓ start
//! InProgress ←──────────────┐
//!   ↓ finish                │ retry
//! Completed | Failed | Cancelled
//! ```

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Selected but nothing has been generated yet
    #[default]
    NotStarted,
    /// Generation is running
    InProgress,
    /// Generation produced an artifact
    Completed,
    /// Generation errored out
    Failed,
    /// Caller gave up on the generation
    Cancelled,
}

impl GenerationStatus {
    pub const ALL: [GenerationStatus; 5] = [
        GenerationStatus::NotStarted,
        GenerationStatus::InProgress,
        GenerationStatus::Completed,
        GenerationStatus::Failed,
        GenerationStatus::Cancelled,
    ];

    /// Check whether a transition follows the lifecycle above.
    ///
    /// Entering `InProgress` is always allowed: a retry out of a terminal
    /// state is the caller's decision.
    pub fn can_transition_to(&self, target: GenerationStatus) -> bool {
        match (self, target) {
            (a, b) if *a == b => true,
            (_, GenerationStatus::InProgress) => true,
            (GenerationStatus::InProgress, b) => b.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationStatus::Completed | GenerationStatus::Failed | GenerationStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::NotStarted => "not_started",
            GenerationStatus::InProgress => "in_progress",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
            GenerationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_started" => Ok(GenerationStatus::NotStarted),
            "in_progress" => Ok(GenerationStatus::InProgress),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            "cancelled" => Ok(GenerationStatus::Cancelled),
            _ => Err(format!("Unknown generation status: {}", s)),
        }
    }
}
