//! Hard constraints accumulated from committed paths, and the safe intervals
//! they leave open on each cell.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::common::Node;

/// Upper bound of a safe interval that never closes.
pub const INFINITY: usize = usize::MAX;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Ord, PartialOrd, Serialize)]
pub struct SafeInterval {
    pub start: usize,
    pub end: usize, // inclusive, `INFINITY` if unbounded
}

impl SafeInterval {
    pub fn contains(&self, time: usize) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.end == INFINITY
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Ord, PartialOrd)]
pub enum Constraint {
    Vertex {
        position: (usize, usize),
        time_step: usize,
        is_permanent: bool, // blocked from `time_step` onwards
    },
    Edge {
        from_position: (usize, usize),
        to_position: (usize, usize),
        to_time_step: usize,
    },
}

impl Constraint {
    pub fn is_violated(&self, from: (usize, usize), to: (usize, usize), time: usize) -> bool {
        match *self {
            Constraint::Vertex {
                position,
                time_step,
                is_permanent,
            } => {
                position == to
                    && if is_permanent {
                        time >= time_step
                    } else {
                        time == time_step
                    }
            }
            Constraint::Edge {
                from_position,
                to_position,
                to_time_step,
            } => from_position == from && to_position == to && to_time_step == time,
        }
    }
}

/// Indexed set of constraints for one search.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSet {
    vertex: HashMap<(usize, usize), BTreeSet<usize>>,
    permanent: HashMap<(usize, usize), usize>,
    edge: HashSet<((usize, usize), (usize, usize), usize)>,
    last_time_step: usize,
    len: usize,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, constraint: Constraint) {
        match constraint {
            Constraint::Vertex {
                position,
                time_step,
                is_permanent: false,
            } => {
                if !self.vertex.entry(position).or_default().insert(time_step) {
                    return;
                }
                self.last_time_step = self.last_time_step.max(time_step);
            }
            Constraint::Vertex {
                position,
                time_step,
                is_permanent: true,
            } => {
                let from = self.permanent.entry(position).or_insert(time_step);
                *from = (*from).min(time_step);
                self.last_time_step = self.last_time_step.max(time_step);
            }
            Constraint::Edge {
                from_position,
                to_position,
                to_time_step,
            } => {
                if !self.edge.insert((from_position, to_position, to_time_step)) {
                    return;
                }
                self.last_time_step = self.last_time_step.max(to_time_step);
            }
        }
        self.len += 1;
    }

    /// Reserves a committed path: every visited `(cell, time)`, its goal from
    /// the arrival time onwards, and with `avoid_edges` the reverse of every
    /// move so nobody can swap with it.
    pub fn add_path(&mut self, path: &[Node], avoid_edges: bool) {
        let Some((goal, moves)) = path.split_last() else {
            return;
        };

        for node in moves {
            self.insert(Constraint::Vertex {
                position: node.position,
                time_step: node.time,
                is_permanent: false,
            });
        }
        self.insert(Constraint::Vertex {
            position: goal.position,
            time_step: goal.time,
            is_permanent: true,
        });

        if avoid_edges {
            for window in path.windows(2) {
                let (from, to) = (window[0], window[1]);
                if from.position == to.position {
                    continue;
                }
                self.insert(Constraint::Edge {
                    from_position: to.position,
                    to_position: from.position,
                    to_time_step: to.time,
                });
            }
        }
    }

    pub fn is_vertex_blocked(&self, position: (usize, usize), time: usize) -> bool {
        self.permanent.get(&position).is_some_and(|&from| time >= from)
            || self
                .vertex
                .get(&position)
                .is_some_and(|times| times.contains(&time))
    }

    pub fn is_edge_blocked(&self, from: (usize, usize), to: (usize, usize), time: usize) -> bool {
        self.edge.contains(&(from, to, time))
    }

    /// Whether moving `from -> to` and arriving at `time` breaks any constraint.
    pub fn is_violated(&self, from: (usize, usize), to: (usize, usize), time: usize) -> bool {
        self.is_vertex_blocked(to, time) || self.is_edge_blocked(from, to, time)
    }

    /// Maximal unblocked time ranges of `position`, ordered by start. A cell
    /// in `occupied` is held by someone for all time and has none.
    pub fn safe_intervals(
        &self,
        position: (usize, usize),
        occupied: &HashSet<(usize, usize)>,
    ) -> Vec<SafeInterval> {
        let mut intervals = Vec::new();
        if occupied.contains(&position) {
            return intervals;
        }

        let closed_from = self.permanent.get(&position).copied();
        let mut start = 0;
        if let Some(times) = self.vertex.get(&position) {
            for &time in times {
                if closed_from.is_some_and(|from| time >= from) {
                    break;
                }
                if time > start {
                    intervals.push(SafeInterval {
                        start,
                        end: time - 1,
                    });
                }
                start = time + 1;
            }
        }

        match closed_from {
            Some(from) if from > start => intervals.push(SafeInterval {
                start,
                end: from - 1,
            }),
            Some(_) => {}
            None => intervals.push(SafeInterval {
                start,
                end: INFINITY,
            }),
        }
        intervals
    }

    /// The safe interval of `position` containing `time`, if it is not blocked.
    pub fn interval_at(
        &self,
        position: (usize, usize),
        time: usize,
        occupied: &HashSet<(usize, usize)>,
    ) -> Option<SafeInterval> {
        self.safe_intervals(position, occupied)
            .into_iter()
            .find(|interval| interval.contains(time))
    }

    /// Whether an agent arriving at `position` at `time` can stay there forever.
    pub fn is_safe_forever(
        &self,
        position: (usize, usize),
        time: usize,
        occupied: &HashSet<(usize, usize)>,
    ) -> bool {
        self.interval_at(position, time, occupied)
            .is_some_and(|interval| interval.is_unbounded())
    }

    /// Latest timestep mentioned by any constraint; the constraint picture is
    /// static after it.
    pub fn last_time_step(&self) -> usize {
        self.last_time_step
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
