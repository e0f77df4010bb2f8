//! Token accounting.

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider for one generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_read_tokens: u64,
    pub total_tokens: u64,
}
