//! Conflict-avoidance table.
//!
//! Counts how many committed agents occupy each `(x, y, time)`. The table is
//! only consulted for soft costs: a crowded cell is penalized, never
//! forbidden. Keys are ordered `(x, y, time)` so all entries of one cell form a
//! contiguous, time-sorted range.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::common::Node;
use crate::error::{PlanError, PlanResult};

type Key = (usize, usize, usize);

fn key(node: &Node) -> Key {
    (node.position.0, node.position.1, node.time)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictAvoidanceTable {
    // Never holds a zero count.
    agents_count: BTreeMap<Key, usize>,
}

impl ConflictAvoidanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent_position(&mut self, node: &Node) {
        *self.agents_count.entry(key(node)).or_insert(0) += 1;
    }

    pub fn add_agent_path(&mut self, path: &[Node]) {
        for node in path {
            self.add_agent_position(node);
        }
    }

    pub fn remove_agent_position(&mut self, node: &Node) -> PlanResult<()> {
        match self.agents_count.entry(key(node)) {
            Entry::Occupied(entry) if *entry.get() == 1 => {
                entry.remove();
            }
            Entry::Occupied(mut entry) => *entry.get_mut() -= 1,
            Entry::Vacant(_) => {
                return Err(PlanError::InconsistentLedgerUse {
                    position: node.position,
                    time: node.time,
                })
            }
        }
        Ok(())
    }

    /// Removes every position of `path`, or none of them if any position
    /// (counting repeats) is not recorded.
    pub fn remove_agent_path(&mut self, path: &[Node]) -> PlanResult<()> {
        let mut required: BTreeMap<Key, usize> = BTreeMap::new();
        for node in path {
            let needed = required.entry(key(node)).or_insert(0);
            *needed += 1;
            if self.agents_count.get(&key(node)).copied().unwrap_or(0) < *needed {
                return Err(PlanError::InconsistentLedgerUse {
                    position: node.position,
                    time: node.time,
                });
            }
        }

        for node in path {
            self.remove_agent_position(node)?;
        }
        Ok(())
    }

    pub fn get_agents_count(&self, node: &Node) -> usize {
        self.agents_count.get(&key(node)).copied().unwrap_or(0)
    }

    /// Run-length encoding of the occupancy of `node`'s cell over
    /// `[start_time, end_time]`.
    ///
    /// Each `(time, count)` pair opens a run that lasts until the next pair
    /// starts, the last one until `end_time`. Gaps between recorded times are
    /// filled with zero runs, so the runs cover the whole range.
    pub fn get_soft_conflict_intervals(
        &self,
        node: &Node,
        start_time: usize,
        end_time: usize,
    ) -> Vec<(usize, usize)> {
        let mut intervals = Vec::new();
        if start_time > end_time {
            return intervals;
        }

        let (x, y) = node.position;
        let mut count = 0;
        let mut run_start = None;
        // First timestep not yet covered by a run.
        let mut next_time = start_time;

        let entries = self
            .agents_count
            .range((x, y, start_time)..=(x, y, end_time));
        for (&(_, _, time), &agents) in entries {
            let gap = time > next_time;
            if gap || agents != count {
                if let Some(begin) = run_start {
                    intervals.push((begin, count));
                }
                if gap {
                    intervals.push((next_time, 0));
                }
                run_start = Some(time);
                count = agents;
            }
            next_time = time + 1;
        }

        if let Some(begin) = run_start {
            intervals.push((begin, count));
        }
        if next_time <= end_time {
            intervals.push((next_time, 0));
        }
        intervals
    }

    /// Sum of occupant counts over every timestep in `[start_time, end_time]`.
    pub fn soft_cost(&self, node: &Node, start_time: usize, end_time: usize) -> usize {
        let intervals = self.get_soft_conflict_intervals(node, start_time, end_time);
        intervals
            .iter()
            .enumerate()
            .map(|(index, &(begin, count))| {
                let end = intervals
                    .get(index + 1)
                    .map_or(end_time, |&(next, _)| next - 1);
                count.saturating_mul((end - begin).saturating_add(1))
            })
            .fold(0, usize::saturating_add)
    }

    pub fn len(&self) -> usize {
        self.agents_count.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents_count.is_empty()
    }
}
