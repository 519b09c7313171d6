use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Default)]
#[command(
    name = "Rust MAPF",
    about = "Prioritized planning with safe-interval search.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the map file")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to the MovingAI scenario file")]
    pub scen_path: Option<String>,

    #[arg(long, help = "Path to a YAML agent list, used instead of the scenario")]
    pub agents_path: Option<String>,

    #[arg(long, help = "Path to the JSON result file")]
    pub output_path: Option<String>,

    #[arg(long, help = "Number of agents")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Scenario bucket of each agent", value_delimiter = ',')]
    pub agents_dist: Option<Vec<usize>>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, value_enum, help = "Successor generation of the single-agent search")]
    pub successor: Option<SuccessorKind>,

    #[arg(long, help = "Break cost ties by conflicts with committed agents")]
    pub use_soft_cost: Option<bool>,

    #[arg(long, help = "Forbid swapping positions with committed agents")]
    pub avoid_edge_conflicts: Option<bool>,

    #[arg(long, help = "Stop planning after the first failed agent")]
    pub abort_on_failure: Option<bool>,

    #[arg(long, help = "Keep failed agents on their start cell")]
    pub hold_failed_starts: Option<bool>,

    #[arg(long, help = "Expansion limit of each single-agent search")]
    pub max_expansions: Option<usize>,

    #[arg(long, help = "Time limit of each single-agent search in milliseconds")]
    pub time_limit_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SuccessorKind {
    /// One successor per reachable safe interval.
    #[default]
    Sipp,
    /// One successor per neighbor and timestep.
    TimeExpansion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub map_path: String,
    pub scen_path: String,
    pub agents_path: Option<String>,
    pub output_path: Option<String>,
    pub num_agents: usize,
    pub agents_dist: Vec<usize>,
    pub seed: u64,
    pub successor: SuccessorKind,
    pub use_soft_cost: bool,
    pub avoid_edge_conflicts: bool,
    pub abort_on_failure: bool,
    pub hold_failed_starts: bool,
    pub max_expansions: Option<usize>,
    pub time_limit_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: "map_file/test/test.map".to_string(),
            scen_path: "map_file/test/test.scen".to_string(),
            agents_path: None,
            output_path: None,
            num_agents: 2,
            agents_dist: Vec::new(),
            seed: 0,
            successor: SuccessorKind::Sipp,
            use_soft_cost: true,
            avoid_edge_conflicts: true,
            abort_on_failure: false,
            hold_failed_starts: false,
            max_expansions: None,
            time_limit_ms: None,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).context("invalid config yaml")?;
        Ok(config)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = map_path.clone();
        }
        if let Some(scen_path) = &cli.scen_path {
            self.scen_path = scen_path.clone();
        }
        if cli.agents_path.is_some() {
            self.agents_path = cli.agents_path.clone();
        }
        if cli.output_path.is_some() {
            self.output_path = cli.output_path.clone();
        }
        if let Some(num_agents) = cli.num_agents {
            self.num_agents = num_agents;
        }
        if let Some(agents_dist) = &cli.agents_dist {
            self.agents_dist = agents_dist.clone();
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(successor) = cli.successor {
            self.successor = successor;
        }
        if let Some(use_soft_cost) = cli.use_soft_cost {
            self.use_soft_cost = use_soft_cost;
        }
        if let Some(avoid_edge_conflicts) = cli.avoid_edge_conflicts {
            self.avoid_edge_conflicts = avoid_edge_conflicts;
        }
        if let Some(abort_on_failure) = cli.abort_on_failure {
            self.abort_on_failure = abort_on_failure;
        }
        if let Some(hold_failed_starts) = cli.hold_failed_starts {
            self.hold_failed_starts = hold_failed_starts;
        }
        if cli.max_expansions.is_some() {
            self.max_expansions = cli.max_expansions;
        }
        if cli.time_limit_ms.is_some() {
            self.time_limit_ms = cli.time_limit_ms;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agents_path.is_none() && self.num_agents == 0 {
            bail!("Number of agents must be positive");
        }

        if !self.agents_dist.is_empty() && self.agents_dist.len() != self.num_agents {
            bail!(
                "Agent distribution lists {} buckets for {} agents",
                self.agents_dist.len(),
                self.num_agents
            );
        }

        if self.max_expansions == Some(0) {
            bail!("Expansion limit must be positive");
        }

        if self.time_limit_ms == Some(0) {
            bail!("Time limit must be positive");
        }

        Ok(())
    }
}
