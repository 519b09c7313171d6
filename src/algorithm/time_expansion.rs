use super::{SearchContext, Successor, SuccessorGenerator};
use crate::common::Node;

/// Classic time-expanded successor generation: every neighbor, waiting
/// included, one timestep later.
///
/// After the last constrained timestep nothing changes any more, so states
/// past it are keyed by a single collapsed timestep and the search stays
/// finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeExpansion;

impl TimeExpansion {
    fn collapsed_time(time: usize, context: &SearchContext) -> usize {
        time.min(context.constraints.last_time_step() + 1)
    }
}

impl SuccessorGenerator for TimeExpansion {
    fn name(&self) -> &'static str {
        "time_expansion"
    }

    fn state_key(&self, node: &Node, context: &SearchContext) -> Option<usize> {
        if context.occupied.contains(&node.position)
            || context
                .constraints
                .is_vertex_blocked(node.position, node.time)
        {
            return None;
        }
        Some(Self::collapsed_time(node.time, context))
    }

    fn find_successors(&self, current: &Node, context: &SearchContext) -> Vec<Successor> {
        let time = current.time + 1;
        let (x, y) = current.position;

        context
            .map
            .get_neighbors(x, y)
            .iter()
            .filter(|&&neighbor| {
                !context.occupied.contains(&neighbor)
                    && !context
                        .constraints
                        .is_violated(current.position, neighbor, time)
            })
            .map(|&neighbor| {
                let node = Node::new(neighbor, time);
                Successor {
                    node,
                    key: Self::collapsed_time(time, context),
                    soft_cost: context.cat.map_or(0, |cat| cat.get_agents_count(&node)),
                }
            })
            .collect()
    }
}
