use std::fmt::{Display, Formatter, Write};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tenure_core::{AppResult, NonEmptyString};

/// Identifier of one unit of coordinated recurring work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey(NonEmptyString);

impl TaskKey {
    /// Creates a validated task key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Derives the shared lease resource key for this task.
    #[must_use]
    pub fn lease_resource_key(&self) -> LeaseResourceKey {
        LeaseResourceKey::derive(self)
    }
}

impl Display for TaskKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Deterministic, path-safe name of the shared lease resource for one task key.
///
/// Lowercase hex SHA-256 of the task key, so distinct keys never share a
/// resource and the name is safe to embed in file paths and Redis keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseResourceKey(String);

impl LeaseResourceKey {
    fn derive(task_key: &TaskKey) -> Self {
        let digest = Sha256::digest(task_key.as_str().as_bytes());
        let hex = digest
            .iter()
            .fold(String::with_capacity(digest.len() * 2), |mut acc, byte| {
                let _ = write!(acc, "{byte:02x}");
                acc
            });

        Self(hex)
    }

    /// Returns the resource key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for LeaseResourceKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The task one worker process competes for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAssignment {
    key: TaskKey,
    is_composite: bool,
}

impl TaskAssignment {
    /// Assignment for a single primitive task key.
    #[must_use]
    pub fn primitive(key: TaskKey) -> Self {
        Self {
            key,
            is_composite: false,
        }
    }

    /// Assignment for a composite key built from combination rules.
    #[must_use]
    pub fn composite(key: TaskKey) -> Self {
        Self {
            key,
            is_composite: true,
        }
    }

    /// Returns the assigned task key.
    #[must_use]
    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Returns whether the key aggregates ingredient keys.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.is_composite
    }
}
