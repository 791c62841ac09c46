//! Opaque references to objects living in the interpreter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named object bound inside the interpreter by an earlier command.
///
/// `name` is the binding and `id` the engine's object id at the time the
/// handle was fetched. Substituting a handle into a later command verifies
/// both, so a handle whose name was rebound or released fails loudly instead
/// of silently addressing another object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub name: String,
    pub id: u64,
    pub kind: String,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>, id: u64, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id,
            kind: kind.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.name, self.id, self.kind)
    }
}
