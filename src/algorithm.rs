mod astar;
mod sipp;
mod time_expansion;

pub use astar::a_star_search;
pub use sipp::Sipp;
pub use time_expansion::TimeExpansion;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cat::ConflictAvoidanceTable;
use crate::common::{Agent, Node, Path};
use crate::config::SuccessorKind;
use crate::constraint::ConstraintSet;
use crate::error::{PlanError, PlanResult};
use crate::map::Map;

/// Search state identity: a cell plus the generator-specific state key.
pub(crate) type StateKey = ((usize, usize), usize);

type Trace = HashMap<StateKey, (StateKey, Node)>;

/// Everything a single-agent search reads. All of it is shared and stays
/// untouched until the search returns.
pub struct SearchContext<'a> {
    pub map: &'a Map,
    pub agent: &'a Agent,
    pub heuristic: &'a [Vec<usize>],
    /// Cells held by someone for all time.
    pub occupied: &'a HashSet<(usize, usize)>,
    pub constraints: &'a ConstraintSet,
    /// Soft costs are only computed when a table is given.
    pub cat: Option<&'a ConflictAvoidanceTable>,
}

impl SearchContext<'_> {
    pub(crate) fn heuristic_at(&self, position: (usize, usize)) -> usize {
        self.heuristic[position.0][position.1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Successor {
    pub node: Node,
    /// Together with the position, identifies the search state.
    pub key: usize,
    /// Committed-agent occupancy met while reaching `node`, waiting included.
    pub soft_cost: usize,
}

/// Successor-generation policy plugged into [`a_star_search`].
pub trait SuccessorGenerator {
    fn name(&self) -> &'static str;

    /// State key of `node`, or `None` if `node` itself is blocked.
    fn state_key(&self, node: &Node, context: &SearchContext) -> Option<usize>;

    /// Legal one-move successors of `current`. Empty means a dead end.
    fn find_successors(&self, current: &Node, context: &SearchContext) -> Vec<Successor>;
}

pub fn successor_generator(kind: SuccessorKind) -> Box<dyn SuccessorGenerator> {
    match kind {
        SuccessorKind::Sipp => Box::new(Sipp),
        SuccessorKind::TimeExpansion => Box::new(TimeExpansion),
    }
}

/// Limits on one single-agent search.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    pub max_expansions: Option<usize>,
    pub time_limit: Option<Duration>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SearchBudget {
    pub(crate) fn check(&self, agent: usize, expansions: usize, started: Instant) -> PlanResult<()> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|cancel| cancel.load(Ordering::Relaxed))
        {
            return Err(PlanError::Cancelled { agent });
        }
        if let Some(limit) = self.max_expansions {
            if expansions >= limit {
                return Err(PlanError::ExpansionLimit { agent, limit });
            }
        }
        if self
            .time_limit
            .is_some_and(|limit| started.elapsed() >= limit)
        {
            return Err(PlanError::TimeLimit { agent });
        }
        Ok(())
    }
}

/// Rebuilds the path ending in `goal` and fills every skipped timestep with a
/// wait on the earlier cell.
fn construct_path(trace: &Trace, mut current: StateKey, goal: Node) -> Path {
    let mut sparse = vec![goal];
    while let Some(&(parent, node)) = trace.get(&current) {
        sparse.push(node);
        current = parent;
    }
    sparse.reverse();

    let mut path = Vec::with_capacity(goal.time + 1);
    for window in sparse.windows(2) {
        let (from, to) = (window[0], window[1]);
        path.extend((from.time..to.time).map(|time| Node::new(from.position, time)));
    }
    path.push(goal);
    path
}
