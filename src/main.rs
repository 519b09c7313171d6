use mapf_sipp::config::{Cli, Config};
use mapf_sipp::map::Map;
use mapf_sipp::scenario::Scenario;
use mapf_sipp::solver::{PrioritizedPlanning, Solver};

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)
            .with_context(|| format!("cannot read config file: {config_file}"))?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let map = Map::from_file(&config.map_path)?;
    let agents = if let Some(agents_path) = config.agents_path.as_ref() {
        Scenario::load_agents_from_yaml(agents_path)?
    } else {
        let scenario = Scenario::load_from_scen(&config.scen_path)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        if config.agents_dist.is_empty() {
            scenario.generate_agents_randomly(config.num_agents, &mut rng)?
        } else {
            scenario.generate_agents_by_buckets(config.num_agents, &config.agents_dist, &mut rng)?
        }
    };

    let mut solver = PrioritizedPlanning::new(agents.clone(), &map);
    let result = solver.solve(&config);

    for error in result.failures() {
        error!("{error}");
    }
    if !result
        .solution()
        .verify(&map, &agents, config.avoid_edge_conflicts)
    {
        error!("committed paths collide");
    }

    if let Some(output_path) = config.output_path.as_ref() {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("cannot write result file: {output_path}"))?;
        info!("result written to {output_path}");
    }

    Ok(())
}
