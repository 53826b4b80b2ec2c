use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Batch time in milliseconds since epoch. One batch is produced per tick.
pub type BatchTime = i64;

/// Unique identifier for stream nodes within one streaming context.
pub type NodeId = u32;

/// How the batches leaving a node are encoded when they cross into the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializationMode {
    /// Opaque serialized bytes, produced by a transformation function.
    #[default]
    Byte,
    /// Structured objects the runtime can read natively.
    Object,
}

impl fmt::Display for SerializationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationMode::Byte => f.write_str("Byte"),
            SerializationMode::Object => f.write_str("Object"),
        }
    }
}

impl FromStr for SerializationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "byte" => Ok(SerializationMode::Byte),
            "object" => Ok(SerializationMode::Object),
            other => Err(format!("unknown serialization mode: {other}")),
        }
    }
}

/// Storage level requested when a node is cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageLevel {
    MemoryOnly,
    #[default]
    MemoryOnlySer,
    MemoryAndDisk,
    DiskOnly,
}

/// Opaque reference to a materialized node, issued and owned by the runtime.
///
/// The core never interprets the value; it only stores it and hands it back
/// to the runtime as an upstream reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuntimeHandle(u64);

impl RuntimeHandle {
    /// Wrap a runtime-assigned identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The runtime-assigned identifier.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
