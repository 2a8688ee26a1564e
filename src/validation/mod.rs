//! Input and candidate validation.
//!
//! - [`prevalidate`]: fail-fast gate run before any search. Rejects tasks
//!   that cannot possibly be placed (no duration, nowhere to put them).
//! - [`dependency_order`]: prerequisite-first ordering with cycle
//!   detection (DAG validation).
//! - [`validate_candidate`]: re-checks an externally optimized schedule
//!   against the hard constraints before it may replace the warm start.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

mod candidate;

pub use candidate::validate_candidate;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::models::{codes, Diagnostic, EngineInput, TaskId};

/// Checks every task the engine must place for a resolvable duration and
/// location.
///
/// # Returns
/// All `MISSING_DURATION` / `MISSING_SPACE_OR_ZONE` reasons, in task
/// order. Empty means the input may be searched.
pub fn prevalidate(input: &EngineInput) -> Vec<Diagnostic> {
    let mut reasons = Vec::new();

    for task in input.tasks.iter().filter(|t| t.needs_placement()) {
        if input.resolved_duration(task).is_none() {
            reasons.push(
                Diagnostic::new(
                    codes::MISSING_DURATION,
                    format!("Task {} has no positive duration", task.id),
                )
                .for_task(task.id),
            );
        }
        if task.space_id.is_none() && task.zone_id.is_none() {
            reasons.push(
                Diagnostic::new(
                    codes::MISSING_SPACE_OR_ZONE,
                    format!("Task {} has neither a space nor a zone", task.id),
                )
                .for_task(task.id),
            );
        }
    }

    reasons
}

/// Prerequisite-first ordering of a dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyOrder {
    /// Acyclic nodes, every prerequisite before its dependents.
    pub order: Vec<TaskId>,
    /// Nodes lying on at least one cycle.
    pub cyclic: BTreeSet<TaskId>,
}

/// Orders tasks so that prerequisites come first.
///
/// `prerequisites` maps every node to the nodes it depends on. References
/// to ids that are not keys are dangling and ignored.
///
/// # Algorithm
/// DFS over prerequisite edges; the post-order is a topological order.
/// A back-edge (reaching a node still on the DFS path) marks every node on
/// the path segment it closes as cyclic. Roots and neighbours are visited
/// in ascending id order, so the result is deterministic.
pub fn dependency_order(prerequisites: &BTreeMap<TaskId, Vec<TaskId>>) -> DependencyOrder {
    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut path: Vec<TaskId> = Vec::new();
    let mut result = DependencyOrder::default();

    for &node in prerequisites.keys() {
        if !visited.contains(&node) {
            visit(node, prerequisites, &mut visited, &mut path, &mut result);
        }
    }

    result.order.retain(|id| !result.cyclic.contains(id));
    result
}

fn visit(
    node: TaskId,
    prerequisites: &BTreeMap<TaskId, Vec<TaskId>>,
    visited: &mut HashSet<TaskId>,
    path: &mut Vec<TaskId>,
    result: &mut DependencyOrder,
) {
    visited.insert(node);
    path.push(node);

    let mut next: Vec<TaskId> = prerequisites
        .get(&node)
        .map(|deps| {
            deps.iter()
                .copied()
                .filter(|d| prerequisites.contains_key(d))
                .collect()
        })
        .unwrap_or_default();
    next.sort_unstable();
    next.dedup();

    for dep in next {
        if let Some(pos) = path.iter().position(|&p| p == dep) {
            // Back edge: the path from `dep` to here is a cycle.
            result.cyclic.extend(path[pos..].iter().copied());
        } else if !visited.contains(&dep) {
            visit(dep, prerequisites, visited, path, result);
        }
    }

    path.pop();
    result.order.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, TaskStatus, TimeWindow};

    fn graph(edges: &[(TaskId, &[TaskId])]) -> BTreeMap<TaskId, Vec<TaskId>> {
        edges.iter().map(|(n, deps)| (*n, deps.to_vec())).collect()
    }

    fn position(order: &[TaskId], id: TaskId) -> usize {
        order.iter().position(|&x| x == id).unwrap()
    }

    #[test]
    fn test_prevalidate_clean() {
        let input = EngineInput::new(TimeWindow::new("09:00", "18:00"))
            .with_task(Task::new(1).with_space(1).with_duration(30))
            .with_task(Task::new(2).with_zone(1).with_duration(15));
        assert!(prevalidate(&input).is_empty());
    }

    #[test]
    fn test_prevalidate_reports_each_defect() {
        let input = EngineInput::new(TimeWindow::new("09:00", "18:00"))
            .with_task(Task::new(1).with_space(1))
            .with_task(Task::new(2).with_duration(30))
            .with_task(Task::new(3));
        let reasons = prevalidate(&input);
        let pairs: Vec<(&str, Option<TaskId>)> =
            reasons.iter().map(|r| (r.code.as_str(), r.task_id)).collect();
        assert_eq!(
            pairs,
            vec![
                (codes::MISSING_DURATION, Some(1)),
                (codes::MISSING_SPACE_OR_ZONE, Some(2)),
                (codes::MISSING_DURATION, Some(3)),
                (codes::MISSING_SPACE_OR_ZONE, Some(3)),
            ]
        );
    }

    #[test]
    fn test_prevalidate_skips_final_and_manual() {
        let input = EngineInput::new(TimeWindow::new("09:00", "18:00"))
            .with_task(Task::new(1).with_status(TaskStatus::Done))
            .with_task(Task::new(2).with_status(TaskStatus::Cancelled))
            .with_task(Task::new(3).manual_block());
        assert!(prevalidate(&input).is_empty());
    }

    #[test]
    fn test_chain_order() {
        // 3 depends on 2, 2 depends on 1
        let order = dependency_order(&graph(&[(3, &[2]), (2, &[1]), (1, &[])]));
        assert_eq!(order.order, vec![1, 2, 3]);
        assert!(order.cyclic.is_empty());
    }

    #[test]
    fn test_dangling_reference_ignored() {
        let order = dependency_order(&graph(&[(1, &[99]), (2, &[1])]));
        assert_eq!(order.order, vec![1, 2]);
        assert!(order.cyclic.is_empty());
    }

    #[test]
    fn test_cycle_detected() {
        // 1 → 2 → 3 → 1, and 4 depends on the cycle.
        let order = dependency_order(&graph(&[(1, &[3]), (2, &[1]), (3, &[2]), (4, &[1]), (5, &[])]));
        assert_eq!(order.cyclic, BTreeSet::from([1, 2, 3]));
        assert_eq!(order.order, vec![4, 5]);
    }

    #[test]
    fn test_diamond() {
        let order = dependency_order(&graph(&[(4, &[2, 3]), (2, &[1]), (3, &[1]), (1, &[])]));
        assert_eq!(order.order.len(), 4);
        assert!(position(&order.order, 1) < position(&order.order, 2));
        assert!(position(&order.order, 1) < position(&order.order, 3));
        assert!(position(&order.order, 3) < position(&order.order, 4));
    }
}
