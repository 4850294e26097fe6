//! Action collaborator seam and the arguments carried through a cascade.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Positional and named arguments handed to `fire`.
///
/// They reach every action and every sub-event of the cascade unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FireArgs {
    #[serde(default)]
    pub positional: Vec<Value>,
    #[serde(default)]
    pub named: BTreeMap<String, Value>,
}

impl FireArgs {
    /// No arguments; what a delayed successor receives.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Something an event starts or stops when it fires.
///
/// Actions are shared between events and may be invoked from sensor or timer
/// threads. An error aborts the rest of the cascade that invoked it.
pub trait Action: Send + Sync {
    /// Name used in error reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn fire(&self, args: &FireArgs) -> anyhow::Result<()>;

    fn stop(&self, args: &FireArgs) -> anyhow::Result<()>;
}
