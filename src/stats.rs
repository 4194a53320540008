use std::collections::HashSet;

use crate::query::{ExecutionStats, StageSnapshot};

/// Selects which stages contribute to an aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumPolicy {
    /// Only stages with no children. Leaf stages read from source data, so
    /// their totals are the "real" input throughput; non-leaf stages
    /// re-process rows already counted upstream.
    LeafOnly,
    /// Every stage in the tree. Used for global figures (split counts,
    /// cumulative CPU time) where per-stage totals are additive.
    AllStages,
}

/// Sum task stats across the stage tree under the given policy. An absent
/// root means the query has not been planned yet and yields all zeros.
///
/// Iterative with an explicit stack: plan depth is unbounded.
pub fn aggregate(root: Option<&StageSnapshot>, policy: SumPolicy) -> ExecutionStats {
    let mut total = ExecutionStats::default();
    let mut pending: Vec<&StageSnapshot> = root.into_iter().collect();
    while let Some(stage) = pending.pop() {
        if policy == SumPolicy::AllStages || stage.is_leaf() {
            add_task_stats(stage, &mut total);
        }
        pending.extend(stage.sub_stages.iter());
    }
    total
}

/// Sum only this stage's own task stats, ignoring children. Used for the
/// per-stage rows of the live display.
pub fn sum_task_stats(stage: &StageSnapshot) -> ExecutionStats {
    let mut total = ExecutionStats::default();
    add_task_stats(stage, &mut total);
    total
}

fn add_task_stats(stage: &StageSnapshot, total: &mut ExecutionStats) {
    for task in &stage.tasks {
        total.add(&task.stats);
    }
}

/// Distinct worker addresses (host:port) across the whole tree.
pub fn unique_nodes(root: Option<&StageSnapshot>) -> HashSet<String> {
    let mut nodes = HashSet::new();
    let mut pending: Vec<&StageSnapshot> = root.into_iter().collect();
    while let Some(stage) = pending.pop() {
        for task in &stage.tasks {
            nodes.insert(task.node.clone());
        }
        pending.extend(stage.sub_stages.iter());
    }
    nodes
}
