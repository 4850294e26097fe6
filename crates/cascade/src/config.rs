//! Graph-wide settings.

use serde::{Deserialize, Serialize};

/// Default bound on nested sub-event invocations.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// How many levels of sub-events one `fire` may descend before it fails
    /// with `CascadeDepthExceeded`. Sub-event cycles hit this limit.
    pub max_cascade_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }
}

impl GraphConfig {
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }
}
