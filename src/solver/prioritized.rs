use super::{AgentOutcome, AgentState, MultiagentSearchResult, Solver};
use crate::algorithm::{a_star_search, successor_generator, SearchBudget, SearchContext};
use crate::cat::ConflictAvoidanceTable;
use crate::common::{path_cost, Agent};
use crate::config::Config;
use crate::constraint::ConstraintSet;
use crate::error::PlanError;
use crate::map::Map;
use crate::stat::Stats;

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Plans agents one at a time in the given order. Every committed path
/// becomes a hard constraint for the agents after it and is recorded in the
/// conflict-avoidance table. Earlier agents are never revised, so an agent
/// whose way is blocked by higher-priority paths simply fails.
pub struct PrioritizedPlanning {
    agents: Vec<Agent>,
    map: Map,
    stats: Stats,
    cancel: Option<Arc<AtomicBool>>,
    cat: ConflictAvoidanceTable,
    constraints: ConstraintSet,
}

impl PrioritizedPlanning {
    pub fn new(agents: Vec<Agent>, map: &Map) -> Self {
        PrioritizedPlanning {
            agents,
            map: map.clone(),
            stats: Stats::default(),
            cancel: None,
            cat: ConflictAvoidanceTable::new(),
            constraints: ConstraintSet::new(),
        }
    }

    /// Once the flag is raised, the agent being planned and every agent after
    /// it fail with [`PlanError::Cancelled`].
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Occupancy of all paths committed by the last run.
    pub fn conflict_avoidance_table(&self) -> &ConflictAvoidanceTable {
        &self.cat
    }

    /// Constraints accumulated by the last run.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }
}

impl Solver for PrioritizedPlanning {
    #[instrument(skip_all, name = "prioritized_planning", fields(agents = self.agents.len(), successor = ?config.successor), level = "debug")]
    fn solve(&mut self, config: &Config) -> MultiagentSearchResult {
        let total_solve_start_time = Instant::now();
        self.stats = Stats::default();
        self.cat = ConflictAvoidanceTable::new();
        self.constraints = ConstraintSet::new();

        let generator = successor_generator(config.successor);
        let budget = SearchBudget {
            max_expansions: config.max_expansions,
            time_limit: config.time_limit_ms.map(Duration::from_millis),
            cancel: self.cancel.clone(),
        };

        let mut occupied = HashSet::new();
        let mut states = vec![AgentState::Pending; self.agents.len()];
        let mut expanded_nodes = vec![0; self.agents.len()];
        let mut first_failure = None;

        for (index, agent) in self.agents.iter().enumerate() {
            if let (true, Some(after)) = (config.abort_on_failure, first_failure) {
                debug!("skip agent {:?}, agent {after:?} failed", agent.id);
                states[index] = AgentState::Failed(PlanError::Aborted {
                    agent: agent.id,
                    after,
                });
                self.stats.failed_agents += 1;
                continue;
            }

            states[index] = AgentState::Planning;
            let expanded_before = self.stats.low_level_expand_nodes;

            let result = if !agent.verify(&self.map) {
                let position = if self.map.is_passable(agent.start.0, agent.start.1) {
                    agent.goal
                } else {
                    agent.start
                };
                Err(PlanError::InvalidEndpoint {
                    agent: agent.id,
                    position,
                })
            } else {
                let heuristic = self.map.heuristic_dji(agent.goal);
                let context = SearchContext {
                    map: &self.map,
                    agent,
                    heuristic: &heuristic,
                    occupied: &occupied,
                    constraints: &self.constraints,
                    cat: config.use_soft_cost.then_some(&self.cat),
                };
                a_star_search(generator.as_ref(), &context, &budget, &mut self.stats)
            };
            expanded_nodes[index] = self.stats.low_level_expand_nodes - expanded_before;

            // Nothing is written to the shared tables unless the search succeeded.
            match result {
                Ok(path) => {
                    let cost = path_cost(&path);
                    info!("agent {:?} committed with cost {cost:?}", agent.id);
                    self.cat.add_agent_path(&path);
                    self.constraints
                        .add_path(&path, config.avoid_edge_conflicts);

                    self.stats.costs += cost;
                    self.stats.makespan = self.stats.makespan.max(cost);
                    self.stats.committed_agents += 1;
                    states[index] = AgentState::Committed(path);
                }
                Err(error) => {
                    info!("agent {:?} failed: {error}", agent.id);
                    if config.hold_failed_starts {
                        occupied.insert(agent.start);
                    }
                    first_failure.get_or_insert(agent.id);
                    self.stats.failed_agents += 1;
                    states[index] = AgentState::Failed(error);
                }
            }
        }
        debug_assert!(states.iter().all(AgentState::is_terminal));

        self.stats.time_us = total_solve_start_time.elapsed().as_micros() as usize;
        self.stats.print();

        MultiagentSearchResult {
            outcomes: self
                .agents
                .iter()
                .zip(states)
                .zip(expanded_nodes)
                .map(|((agent, state), expanded_nodes)| AgentOutcome {
                    agent_id: agent.id,
                    state,
                    expanded_nodes,
                })
                .collect(),
            stats: self.stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Node;
    use crate::config::SuccessorKind;
    use crate::scenario::Scenario;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::Ordering;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    fn agent(id: usize, start: (usize, usize), goal: (usize, usize)) -> Agent {
        Agent { id, start, goal }
    }

    fn configs() -> [Config; 2] {
        [
            Config::default(),
            Config {
                successor: SuccessorKind::TimeExpansion,
                ..Config::default()
            },
        ]
    }

    // Agent 0 walks A -> B -> C while agent 1 wants C -> B -> A.
    fn corridor() -> (Map, Vec<Agent>) {
        let map = Map::from_grid_rows(&["..."]).unwrap();
        let agents = vec![agent(0, (0, 0), (0, 2)), agent(1, (0, 2), (0, 0))];
        (map, agents)
    }

    // Agent 2 sits in the corner while agents 0 and 1 park on both exits.
    fn boxed_in() -> (Map, Vec<Agent>) {
        let map = Map::from_file("map_file/test/test.map").unwrap();
        let agents = vec![
            agent(0, (0, 2), (0, 1)),
            agent(1, (2, 0), (1, 0)),
            agent(2, (0, 0), (2, 2)),
            agent(3, (2, 1), (1, 2)),
        ];
        (map, agents)
    }

    #[test]
    fn test_corridor_swap_fails_with_edge_avoidance() {
        init_tracing();
        let (map, agents) = corridor();
        for config in configs() {
            let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
            let result = solver.solve(&config);

            let first = result.outcomes[0].state.path().unwrap();
            assert_eq!(first[1], Node::new((0, 1), 1));
            assert_eq!(
                result.outcomes[1].state,
                AgentState::Failed(PlanError::NoPathFound { agent: 1 })
            );
            assert!(result.solution().verify(&map, &agents, true));
        }
    }

    #[test]
    fn test_corridor_waits_without_edge_avoidance() {
        init_tracing();
        let (map, agents) = corridor();
        for config in configs() {
            let config = Config {
                avoid_edge_conflicts: false,
                ..config
            };
            let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
            let result = solver.solve(&config);

            assert!(result.is_complete());
            let second = result.outcomes[1].state.path().unwrap();
            assert!(!second.contains(&Node::new((0, 1), 1)));
            let cells: Vec<_> = second.iter().map(|node| node.position).collect();
            assert_eq!(cells, vec![(0, 2), (0, 2), (0, 1), (0, 0)]);
            assert!(result.solution().verify(&map, &agents, false));
        }
    }

    #[test]
    fn test_boxed_in_agent_fails_others_succeed() {
        init_tracing();
        let (map, agents) = boxed_in();
        for config in configs() {
            let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
            let result = solver.solve(&config);

            assert_eq!(
                result.failures().cloned().collect::<Vec<_>>(),
                vec![PlanError::NoPathFound { agent: 2 }]
            );
            assert!(result.outcomes[3].state.path().is_some());
            assert_eq!(result.stats.committed_agents, 3);
            assert_eq!(result.stats.failed_agents, 1);
            assert!(result.solution().verify(&map, &agents, true));

            // Only committed paths reach the shared tables.
            let committed: usize = result
                .outcomes
                .iter()
                .filter_map(|outcome| outcome.state.path())
                .map(|path| path.len())
                .sum();
            let mut cat = solver.conflict_avoidance_table().clone();
            for path in result.outcomes.iter().filter_map(|o| o.state.path()) {
                cat.remove_agent_path(path).unwrap();
            }
            assert!(cat.is_empty());
            assert!(committed > 0);
        }
    }

    #[test]
    fn test_abort_on_failure() {
        init_tracing();
        let (map, agents) = boxed_in();
        let config = Config {
            abort_on_failure: true,
            ..Config::default()
        };
        let mut solver = PrioritizedPlanning::new(agents, &map);
        let result = solver.solve(&config);

        assert_eq!(
            result.outcomes[3].state,
            AgentState::Failed(PlanError::Aborted { agent: 3, after: 2 })
        );
        assert_eq!(result.outcomes[3].expanded_nodes, 0);
        assert_eq!(result.stats.failed_agents, 2);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_failed_agent_holds_start() {
        init_tracing();
        let map = Map::from_grid_rows(&["...@"]).unwrap();
        let agents = vec![agent(0, (0, 1), (0, 3)), agent(1, (0, 0), (0, 2))];

        let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
        let result = solver.solve(&Config::default());
        assert_eq!(
            result.outcomes[0].state,
            AgentState::Failed(PlanError::InvalidEndpoint {
                agent: 0,
                position: (0, 3)
            })
        );
        assert_eq!(
            result.outcomes[1].state.path().map(|path| path.len()),
            Some(3)
        );

        let config = Config {
            hold_failed_starts: true,
            ..Config::default()
        };
        let result = solver.solve(&config);
        assert_eq!(
            result.outcomes[1].state,
            AgentState::Failed(PlanError::NoPathFound { agent: 1 })
        );
    }

    #[test]
    fn test_cancelled_run_commits_nothing() {
        init_tracing();
        let (map, agents) = boxed_in();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut solver =
            PrioritizedPlanning::new(agents, &map).with_cancel_flag(cancel.clone());

        assert!(solver.solve(&Config::default()).stats.committed_agents > 0);
        assert!(!solver.conflict_avoidance_table().is_empty());

        cancel.store(true, Ordering::Relaxed);
        let result = solver.solve(&Config::default());
        assert!(result
            .failures()
            .all(|error| matches!(error, PlanError::Cancelled { .. })));
        assert_eq!(result.stats.failed_agents, 4);
        assert!(solver.conflict_avoidance_table().is_empty());
        assert!(solver.constraints().is_empty());
    }

    #[test]
    fn test_crossing_agent_waits_at_start() {
        init_tracing();
        let map = Map::from_file("map_file/test/cross.map").unwrap();
        let agents = vec![agent(0, (1, 1), (1, 3)), agent(1, (0, 2), (2, 2))];
        for config in configs() {
            let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
            let result = solver.solve(&config);

            assert!(result.is_complete());
            let cells: Vec<_> = result.outcomes[1]
                .state
                .path()
                .unwrap()
                .iter()
                .map(|node| node.position)
                .collect();
            assert_eq!(cells, vec![(0, 2), (0, 2), (1, 2), (2, 2)]);
            assert_eq!(result.stats.costs, 5);
            assert_eq!(result.stats.makespan, 3);
        }
    }

    #[test]
    fn test_scenario_agents_end_to_end() {
        init_tracing();
        let map = Map::from_file("map_file/test/test.map").unwrap();
        let scenario = Scenario::load_from_scen("map_file/test/test.scen").unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let agents = scenario
            .generate_agents_by_buckets(2, &[0, 1], &mut rng)
            .unwrap();

        let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
        let result = solver.solve(&Config::default());
        assert!(result.outcomes[0].state.path().is_some());
        assert!(result.outcomes[0].expanded_nodes > 0);
        assert!(result.solution().verify(&map, &agents, true));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcomes"].as_array().unwrap().len(), 2);
        assert!(json["stats"]["committed_agents"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn test_scenario_solution_is_collision_free() {
        init_tracing();
        let map = Map::from_file("map_file/test/test.map").unwrap();
        let agents = vec![
            agent(0, (0, 0), (2, 2)),
            agent(1, (0, 2), (2, 0)),
            agent(2, (0, 1), (2, 1)),
            agent(3, (1, 0), (1, 2)),
        ];
        for config in configs() {
            let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
            let result = solver.solve(&config);
            assert!(result.stats.committed_agents >= 2);
            assert!(result.solution().verify(&map, &agents, true));
        }
    }
}
