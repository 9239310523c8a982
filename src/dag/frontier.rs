// src/dag/frontier.rs

//! Completion frontier: the wavefront of completed work.

use std::collections::HashSet;

use crate::block::BlockKey;
use crate::dag::graph::BlockGraph;

/// Completed blocks that still have at least one downstream block that is
/// not completed.
///
/// For a block that is not itself completed, "every upstream block is in the
/// frontier" is equivalent to "every upstream block is completed", so
/// readiness checks never need to walk the rest of the completed region.
#[derive(Debug, Clone, Default)]
pub struct CompletionFrontier {
    surface: HashSet<BlockKey>,
}

impl CompletionFrontier {
    pub fn contains(&self, block: &BlockKey) -> bool {
        self.surface.contains(block)
    }

    pub fn len(&self) -> usize {
        self.surface.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surface.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockKey> {
        self.surface.iter()
    }

    /// Whether all immediate upstream blocks of `block` are completed.
    pub fn covers_upstream(&self, graph: &BlockGraph, block: &BlockKey) -> bool {
        graph.upstream(block).iter().all(|up| self.contains(up))
    }

    /// Account for `block` having just completed.
    ///
    /// `is_completed` must already report `block` as completed. Upstream
    /// blocks whose downstream blocks are now all completed are retired.
    pub fn record_completion<F>(&mut self, graph: &BlockGraph, block: &BlockKey, is_completed: F)
    where
        F: Fn(&BlockKey) -> bool,
    {
        if graph.downstream(block).iter().any(|down| !is_completed(down)) {
            self.surface.insert(block.clone());
        }

        for up in graph.upstream(block) {
            if !self.surface.contains(up) {
                continue;
            }
            if graph.downstream(up).iter().all(|down| is_completed(down)) {
                self.surface.remove(up);
            }
        }
    }
}
