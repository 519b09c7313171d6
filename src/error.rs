//! Error type shared by the ledger, the single-agent search and the driver.
//!
//! Per-agent failures are values: the driver records them in the result
//! instead of propagating them, so a run always completes.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum PlanError {
    #[error("agent {agent}: no collision-free path found")]
    NoPathFound { agent: usize },

    #[error("agent {agent}: endpoint {position:?} is not a passable cell")]
    InvalidEndpoint {
        agent: usize,
        position: (usize, usize),
    },

    #[error("agent {agent}: expansion limit {limit} reached")]
    ExpansionLimit { agent: usize, limit: usize },

    #[error("agent {agent}: time limit reached")]
    TimeLimit { agent: usize },

    #[error("agent {agent}: search cancelled")]
    Cancelled { agent: usize },

    #[error("agent {agent}: not planned, agent {after} failed earlier")]
    Aborted { agent: usize, after: usize },

    #[error("ledger has no occupation of {position:?} at time {time} to remove")]
    InconsistentLedgerUse {
        position: (usize, usize),
        time: usize,
    },
}

pub type PlanResult<T> = Result<T, PlanError>;
