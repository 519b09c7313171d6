mod prioritized;

pub use prioritized::PrioritizedPlanning;

use serde::Serialize;

use crate::common::{Path, Solution};
use crate::config::Config;
use crate::error::PlanError;
use crate::stat::Stats;

pub trait Solver {
    fn solve(&mut self, config: &Config) -> MultiagentSearchResult;
}

/// Planning state of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AgentState {
    Pending,
    Planning,
    Committed(Path),
    Failed(PlanError),
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Committed(_) | AgentState::Failed(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            AgentState::Committed(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub agent_id: usize,
    pub state: AgentState,
    pub expanded_nodes: usize,
}

/// Outcome of every agent, in priority order, plus run statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MultiagentSearchResult {
    pub outcomes: Vec<AgentOutcome>,
    pub stats: Stats,
}

impl MultiagentSearchResult {
    pub fn is_complete(&self) -> bool {
        self.outcomes
            .iter()
            .all(|outcome| matches!(outcome.state, AgentState::Committed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &PlanError> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.state {
            AgentState::Failed(error) => Some(error),
            _ => None,
        })
    }

    pub fn solution(&self) -> Solution {
        Solution {
            paths: self
                .outcomes
                .iter()
                .map(|outcome| outcome.state.path().cloned())
                .collect(),
        }
    }
}
