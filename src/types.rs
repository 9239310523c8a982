use std::fmt;

use serde::Deserialize;

/// A block count that is either known up front or open-ended.
///
/// Root tasks fed from a lazy source may not know how many blocks they will
/// produce; `Unbounded` stays `Unbounded` under increments and decrements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCount {
    Finite(u64),
    Unbounded,
}

impl BlockCount {
    pub fn is_zero(&self) -> bool {
        matches!(self, BlockCount::Finite(0))
    }

    /// The finite value, if known.
    pub fn finite(&self) -> Option<u64> {
        match self {
            BlockCount::Finite(n) => Some(*n),
            BlockCount::Unbounded => None,
        }
    }

    pub fn increment(&mut self) {
        if let BlockCount::Finite(n) = self {
            *n += 1;
        }
    }

    pub fn decrement(&mut self) {
        if let BlockCount::Finite(n) = self {
            *n = n.saturating_sub(1);
        }
    }
}

impl Default for BlockCount {
    fn default() -> Self {
        BlockCount::Finite(0)
    }
}

impl fmt::Display for BlockCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockCount::Finite(n) => write!(f, "{n}"),
            BlockCount::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// How the blocks of a configured task map onto the blocks of the tasks it
/// runs `after`.
///
/// - `Pointwise`: block `i` waits for block `i` of every upstream task
///   (default; requires equal block counts).
/// - `All`: every block waits for every block of every upstream task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockLink {
    Pointwise,
    All,
}

impl Default for BlockLink {
    fn default() -> Self {
        BlockLink::Pointwise
    }
}
