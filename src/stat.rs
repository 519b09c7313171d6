use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub costs: usize,
    pub makespan: usize,
    pub time_us: usize,
    pub low_level_expand_nodes: usize,
    pub committed_agents: usize,
    pub failed_agents: usize,
}

impl Stats {
    pub(crate) fn print(&self) {
        info!(
            "Cost {:?} Makespan {:?} Time(microseconds) {:?} Low level expand nodes number {:?} Committed {:?} Failed {:?}",
            self.costs,
            self.makespan,
            self.time_us,
            self.low_level_expand_nodes,
            self.committed_agents,
            self.failed_agents
        );
    }
}
