use super::{construct_path, SearchBudget, SearchContext, StateKey, SuccessorGenerator, Trace};
use crate::common::{LowLevelOpenNode, Node, Path};
use crate::error::{PlanError, PlanResult};
use crate::stat::Stats;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, instrument, trace};

/// A* over the states produced by `generator`.
///
/// Goal states are the agent's goal cell at a time from which it can rest
/// there forever. Among equal f costs, states with fewer soft conflicts are
/// expanded first.
#[instrument(skip_all, name = "a_star", fields(agent = context.agent.id, generator = generator.name(), start = format!("{:?}", context.agent.start), goal = format!("{:?}", context.agent.goal)), level = "debug")]
pub fn a_star_search(
    generator: &dyn SuccessorGenerator,
    context: &SearchContext,
    budget: &SearchBudget,
    stats: &mut Stats,
) -> PlanResult<Path> {
    let agent = context.agent;
    debug!(
        "constraints: {:?}, last constrained time step: {:?}",
        context.constraints.len(),
        context.constraints.last_time_step()
    );

    let start = Node::new(agent.start, 0);
    let start_h_open_cost = context.heuristic_at(agent.start);
    let Some(start_key) = generator.state_key(&start, context) else {
        debug!("start is blocked");
        return Err(PlanError::NoPathFound { agent: agent.id });
    };
    if start_h_open_cost == usize::MAX {
        debug!("goal is unreachable from start");
        return Err(PlanError::NoPathFound { agent: agent.id });
    }

    let mut open_list = BTreeSet::new();
    let mut closed_list: HashSet<StateKey> = HashSet::new();
    // Best (arrival time, soft cost) seen for every state.
    let mut best: HashMap<StateKey, (usize, usize)> = HashMap::new();
    let mut trace = Trace::new();

    open_list.insert(LowLevelOpenNode {
        position: agent.start,
        interval: start_key,
        f_open_cost: start_h_open_cost,
        soft_cost: 0,
        g_cost: 0,
    });
    best.insert((agent.start, start_key), (0, 0));

    let started = Instant::now();
    let mut expansions = 0;

    while let Some(current) = open_list.pop_first() {
        let current_key = (current.position, current.interval);
        if !closed_list.insert(current_key) {
            continue;
        }
        trace!("expand node: {current:?}");

        budget.check(agent.id, expansions, started)?;
        expansions += 1;
        stats.low_level_expand_nodes += 1;

        let current_node = Node::new(current.position, current.g_cost);
        if current.position == agent.goal
            && context
                .constraints
                .is_safe_forever(agent.goal, current.g_cost, context.occupied)
        {
            debug!("found path of cost {:?} after {expansions:?} expansions", current.g_cost);
            return Ok(construct_path(&trace, current_key, current_node));
        }

        for successor in generator.find_successors(&current_node, context) {
            let key = (successor.node.position, successor.key);
            if closed_list.contains(&key) {
                continue;
            }

            let h_open_cost = context.heuristic_at(successor.node.position);
            if h_open_cost == usize::MAX {
                continue;
            }

            let g_cost = successor.node.time;
            let soft_cost = current.soft_cost.saturating_add(successor.soft_cost);
            if best
                .get(&key)
                .is_some_and(|&recorded| recorded <= (g_cost, soft_cost))
            {
                continue;
            }
            best.insert(key, (g_cost, soft_cost));

            open_list.insert(LowLevelOpenNode {
                position: successor.node.position,
                interval: successor.key,
                f_open_cost: g_cost + h_open_cost,
                soft_cost,
                g_cost,
            });
            trace.insert(key, (current_key, current_node));
        }
    }

    debug!("cannot find solution after {expansions:?} expansions");
    Err(PlanError::NoPathFound { agent: agent.id })
}
