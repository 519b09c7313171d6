use std::cmp::Ordering;

/// Open list entry of the single-agent search.
///
/// `interval` identifies the search state together with `position`: the start
/// of the safe interval for SIPP, the (collapsed) timestep for time expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LowLevelOpenNode {
    pub(crate) position: (usize, usize),
    pub(crate) interval: usize,
    pub(crate) f_open_cost: usize,
    pub(crate) soft_cost: usize,
    pub(crate) g_cost: usize, // uniform move cost, so this is also the arrival time
}

impl Ord for LowLevelOpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_open_cost
            .cmp(&other.f_open_cost)
            // Fewer collisions with committed agents first, then deeper nodes.
            .then_with(|| self.soft_cost.cmp(&other.soft_cost))
            .then_with(|| other.g_cost.cmp(&self.g_cost))
            .then_with(|| self.position.cmp(&other.position))
            .then_with(|| self.interval.cmp(&other.interval))
    }
}

impl PartialOrd for LowLevelOpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
