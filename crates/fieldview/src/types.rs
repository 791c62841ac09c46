use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process-wide presentation identifier. Issued from a counter starting at 1
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresentationId(pub u64);

impl PresentationId {
    /// Owner tag under which the engine attributes this presentation's objects.
    pub fn owner_tag(&self) -> String {
        format!("presentation-{}", self.0)
    }
}

impl fmt::Display for PresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which field of the dataset a presentation shows.
///
/// `kind` is the field type tag (`POINTS`, `CELLS`, `VECTOR`, ...) and is
/// forwarded to the engine verbatim, as is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub kind: String,
    pub name: String,
}

impl FieldDescriptor {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Data association the engine colours and filters by.
    pub fn association(&self) -> Association {
        match self.kind.to_ascii_uppercase().as_str() {
            "CELLS" | "ON_CELLS" | "P0" => Association::Cells,
            _ => Association::Points,
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    Points,
    Cells,
}

impl Association {
    pub fn as_str(&self) -> &'static str {
        match self {
            Association::Points => "POINTS",
            Association::Cells => "CELLS",
        }
    }
}
