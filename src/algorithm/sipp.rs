use super::{SearchContext, Successor, SuccessorGenerator};
use crate::common::Node;

use std::cmp::max;
use tracing::trace;

/// Safe-interval successor generation.
///
/// A search state is a cell together with one of its safe intervals, and is
/// reached at the earliest feasible time inside that interval. Arriving later
/// in the same interval never helps, because the agent could have waited
/// there instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sipp;

impl SuccessorGenerator for Sipp {
    fn name(&self) -> &'static str {
        "sipp"
    }

    fn state_key(&self, node: &Node, context: &SearchContext) -> Option<usize> {
        context
            .constraints
            .interval_at(node.position, node.time, context.occupied)
            .map(|interval| interval.start)
    }

    fn find_successors(&self, current: &Node, context: &SearchContext) -> Vec<Successor> {
        let constraints = context.constraints;
        let Some(current_interval) =
            constraints.interval_at(current.position, current.time, context.occupied)
        else {
            return Vec::new();
        };

        let earliest = current.time + 1;
        // Waiting is only safe until the current interval closes.
        let latest = current_interval.end.saturating_add(1);

        let mut successors = Vec::new();
        let (x, y) = current.position;
        for &neighbor in context.map.get_neighbors(x, y) {
            for interval in constraints.safe_intervals(neighbor, context.occupied) {
                // Staying put is the state we are expanding.
                if neighbor == current.position && interval.start == current_interval.start {
                    continue;
                }
                if earliest > interval.end || interval.start > latest {
                    continue;
                }

                let window_end = interval.end.min(latest);
                let Some(arrival) = (max(earliest, interval.start)..=window_end)
                    .find(|&time| !constraints.is_edge_blocked(current.position, neighbor, time))
                else {
                    continue;
                };

                let node = Node::new(neighbor, arrival);
                let soft_cost = context.cat.map_or(0, |cat| {
                    // Occupancy of the current cell while waiting, then the arrival.
                    cat.soft_cost(current, earliest, arrival - 1) + cat.get_agents_count(&node)
                });
                trace!("successor {node:?} in {interval:?}, soft cost {soft_cost:?}");

                successors.push(Successor {
                    node,
                    key: interval.start,
                    soft_cost,
                });
            }
        }
        successors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cat::ConflictAvoidanceTable;
    use crate::common::Agent;
    use crate::constraint::{Constraint, ConstraintSet};
    use crate::map::Map;

    use std::collections::HashSet;

    struct Fixture {
        map: Map,
        agent: Agent,
        heuristic: Vec<Vec<usize>>,
        occupied: HashSet<(usize, usize)>,
        constraints: ConstraintSet,
        cat: ConflictAvoidanceTable,
    }

    impl Fixture {
        fn new(rows: &[&str]) -> Self {
            let map = Map::from_grid_rows(rows).unwrap();
            let agent = Agent {
                id: 0,
                start: (0, 0),
                goal: (0, map.width - 1),
            };
            let heuristic = map.heuristic_dji(agent.goal);
            Fixture {
                map,
                agent,
                heuristic,
                occupied: HashSet::new(),
                constraints: ConstraintSet::new(),
                cat: ConflictAvoidanceTable::new(),
            }
        }

        fn block(&mut self, position: (usize, usize), times: &[usize]) {
            for &time_step in times {
                self.constraints.insert(Constraint::Vertex {
                    position,
                    time_step,
                    is_permanent: false,
                });
            }
        }

        fn successors(&self, current: Node) -> Vec<Successor> {
            let context = SearchContext {
                map: &self.map,
                agent: &self.agent,
                heuristic: &self.heuristic,
                occupied: &self.occupied,
                constraints: &self.constraints,
                cat: Some(&self.cat),
            };
            Sipp.find_successors(&current, &context)
        }
    }

    #[test]
    fn test_one_successor_per_interval() {
        let mut fixture = Fixture::new(&["..."]);
        fixture.block((0, 1), &[2, 5]);

        let successors = fixture.successors(Node::new((0, 0), 0));
        let arrivals: Vec<_> = successors
            .iter()
            .filter(|successor| successor.node.position == (0, 1))
            .map(|successor| (successor.node.time, successor.key))
            .collect();
        // Intervals [0, 1], [3, 4] and [6, inf], entered as early as possible.
        assert_eq!(arrivals, vec![(1, 0), (3, 3), (6, 6)]);

        let keys: HashSet<_> = successors
            .iter()
            .map(|successor| (successor.node.position, successor.key))
            .collect();
        assert_eq!(keys.len(), successors.len());
        // Waiting in place is not a new state.
        assert!(successors
            .iter()
            .all(|successor| successor.node.position != (0, 0)));
    }

    #[test]
    fn test_never_arrives_inside_blocked_time() {
        let mut fixture = Fixture::new(&["....", "...."]);
        fixture.block((0, 1), &[1, 2, 4]);
        fixture.block((1, 0), &[1]);
        fixture.block((0, 0), &[3]);
        fixture.constraints.insert(Constraint::Vertex {
            position: (1, 0),
            time_step: 6,
            is_permanent: true,
        });

        for current in [Node::new((0, 0), 0), Node::new((0, 0), 2)] {
            for successor in fixture.successors(current) {
                assert!(!fixture
                    .constraints
                    .is_vertex_blocked(successor.node.position, successor.node.time));
                assert!(successor.node.time > current.time);
            }
        }
    }

    #[test]
    fn test_waiting_bounded_by_current_interval() {
        let mut fixture = Fixture::new(&["..."]);
        // The agent must leave (0, 0) before time 3, and (0, 1) opens at 4.
        fixture.block((0, 0), &[3]);
        fixture.block((0, 1), &[0, 1, 2, 3]);

        let successors = fixture.successors(Node::new((0, 0), 0));
        assert!(successors
            .iter()
            .all(|successor| successor.node.position != (0, 1)));

        // Opening at 3 is reachable by waiting until time 2.
        let mut fixture = Fixture::new(&["..."]);
        fixture.block((0, 0), &[3]);
        fixture.block((0, 1), &[0, 1, 2]);
        let successors = fixture.successors(Node::new((0, 0), 0));
        assert!(successors.contains(&Successor {
            node: Node::new((0, 1), 3),
            key: 3,
            soft_cost: 0,
        }));
    }

    #[test]
    fn test_occupied_cells_and_edges() {
        let mut fixture = Fixture::new(&["...", "..."]);
        fixture.occupied.insert((1, 0));
        fixture.constraints.insert(Constraint::Edge {
            from_position: (0, 0),
            to_position: (0, 1),
            to_time_step: 1,
        });

        let successors = fixture.successors(Node::new((0, 0), 0));
        assert_eq!(
            successors.iter().map(|s| s.node).collect::<Vec<_>>(),
            vec![Node::new((0, 1), 2)]
        );
    }

    #[test]
    fn test_soft_cost_counts_wait_and_arrival() {
        let mut fixture = Fixture::new(&["..."]);
        fixture.block((0, 1), &[1, 2]);
        fixture.cat.add_agent_path(&[
            Node::new((0, 0), 1),
            Node::new((0, 0), 2),
            Node::new((0, 1), 3),
        ]);

        let successors = fixture.successors(Node::new((0, 0), 0));
        let late = successors
            .iter()
            .find(|successor| successor.node == Node::new((0, 1), 3))
            .unwrap();
        assert_eq!(late.soft_cost, 3);
    }
}
