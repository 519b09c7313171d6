mod lowlevel;

pub(crate) use lowlevel::LowLevelOpenNode;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::map::Map;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: (usize, usize),
    pub goal: (usize, usize),
}

impl Agent {
    pub fn verify(&self, map: &Map) -> bool {
        map.is_passable(self.start.0, self.start.1) && map.is_passable(self.goal.0, self.goal.1)
    }
}

/// A grid cell occupied at a discrete timestep.
///
/// Equality, hashing and ordering only look at `(position, time)`; every
/// ledger and constraint lookup is keyed this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node {
    pub position: (usize, usize),
    pub time: usize,
}

impl Node {
    pub fn new(position: (usize, usize), time: usize) -> Self {
        Node { position, time }
    }
}

/// Time-indexed path: `path[t].time == t`, waits appear as repeated positions.
pub type Path = Vec<Node>;

/// Path cost is the arrival time at the last node.
pub fn path_cost(path: &[Node]) -> usize {
    path.last().map_or(0, |node| node.time)
}

/// Position at `time`, assuming the agent rests on its last cell afterwards.
pub fn position_at(path: &[Node], time: usize) -> Option<(usize, usize)> {
    path.get(time)
        .or_else(|| path.last())
        .map(|node| node.position)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Solution {
    /// Indexed like the agent list; `None` for agents without a path.
    pub paths: Vec<Option<Path>>,
}

impl Solution {
    /// Checks each path is a legal walk from its agent's start to goal, and
    /// that no two paths share a cell at any time (agents rest at their goal
    /// forever). Swapping across an edge is only reported when `check_edges`.
    pub fn verify(&self, map: &Map, agents: &[Agent], check_edges: bool) -> bool {
        if self.paths.len() != agents.len() {
            error!(
                "solution holds {} paths for {} agents",
                self.paths.len(),
                agents.len()
            );
            return false;
        }

        for (agent, path) in agents.iter().zip(&self.paths) {
            let Some(path) = path else { continue };
            let (Some(first), Some(last)) = (path.first(), path.last()) else {
                error!("agent {} has an empty path", agent.id);
                return false;
            };
            if first.position != agent.start || last.position != agent.goal {
                error!("agent {} path does not connect start and goal", agent.id);
                return false;
            }
            for (time, window) in path.windows(2).enumerate() {
                let (from, to) = (window[0], window[1]);
                if from.time != time
                    || to.time != time + 1
                    || !map.get_neighbors(from.position.0, from.position.1).contains(&to.position)
                {
                    error!("agent {} makes an illegal move {from:?} -> {to:?}", agent.id);
                    return false;
                }
            }
        }

        let planned: Vec<(usize, &Path)> = agents
            .iter()
            .zip(&self.paths)
            .filter_map(|(agent, path)| path.as_ref().map(|path| (agent.id, path)))
            .collect();
        let horizon = planned.iter().map(|(_, path)| path.len()).max().unwrap_or(0);

        for i in 0..planned.len() {
            for j in (i + 1)..planned.len() {
                let (id1, path1) = planned[i];
                let (id2, path2) = planned[j];
                for time in 0..horizon {
                    let pos1 = position_at(path1, time);
                    let pos2 = position_at(path2, time);
                    if pos1 == pos2 {
                        error!("vertex conflict between agents {id1} and {id2} at {pos1:?}, time {time}");
                        return false;
                    }
                    if !check_edges || time == 0 {
                        continue;
                    }
                    let prev1 = position_at(path1, time - 1);
                    let prev2 = position_at(path2, time - 1);
                    if prev1 == pos2 && prev2 == pos1 {
                        error!("edge conflict between agents {id1} and {id2} at time {time}");
                        return false;
                    }
                }
            }
        }

        true
    }
}
