//! Fogsim CLI
//!
//! Runs one synthetic workload against each requested policy and prints a
//! comparison table

use std::fs;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fogsim_engine::{
    CatalogFleet, PolicyKind, Result, RunSummary, SimulationConfig, SimulationEngine, SyntheticWorkload,
};

#[derive(Parser, Debug)]
#[command(name = "fogsim")]
#[command(about = "Simulate container placement policies on a fog cluster", long_about = None)]
struct Args {
    /// JSON config file (defaults apply to anything it omits)
    #[arg(short, long)]
    config: Option<String>,

    /// Number of intervals to simulate
    #[arg(short, long)]
    steps: Option<u64>,

    /// Fleet size (repeats the last configured host)
    #[arg(long)]
    hosts: Option<usize>,

    /// Policies to compare (comma-separated: first-fit,random)
    #[arg(short, long, default_value = "first-fit,random")]
    policy: String,

    /// Migration candidates drawn per interval (0 disables migration)
    #[arg(long)]
    select: Option<usize>,

    /// Seed for workload and policy randomness
    #[arg(long)]
    seed: Option<u64>,

    /// Mean container arrivals per interval
    #[arg(long)]
    arrival_rate: Option<f64>,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<String>,
}

impl Args {
    fn load_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(hosts) = self.hosts {
            config.fleet.resize(hosts);
        }
        if let Some(select) = self.select {
            config.selection_count = select;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(rate) = self.arrival_rate {
            config.workload.arrival_rate = rate;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fogsim=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.load_config()?;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Fogsim Placement Simulator                              ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    println!("  Intervals: {} x {}s", config.steps, config.interval_secs);
    println!("  Hosts: {}", config.fleet.hosts.len());
    println!("  Container limit: {}", config.container_limit);
    println!("  Arrival rate: {:.2}/interval", config.workload.arrival_rate);
    println!("  Migration candidates: {}/interval", config.selection_count);
    println!("  Seed: {}\n", config.seed);

    let kinds = args
        .policy
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<PolicyKind>)
        .collect::<Result<Vec<_>>>()?;

    let fleet = CatalogFleet::new(config.fleet.clone());
    let mut results: Vec<RunSummary> = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let run_config = SimulationConfig {
            policy: kind,
            ..config.clone()
        };
        let policy = run_config.build_policy();
        info!(policy = policy.name(), "Starting run");

        // Same seed for every policy so they all see the same arrivals
        let mut source =
            SyntheticWorkload::new(run_config.workload.clone(), run_config.interval_secs, run_config.seed)?;
        let mut engine = SimulationEngine::new(run_config, &fleet, policy)?;

        let summary = engine.run(&mut source)?;
        results.push(summary);
    }

    println!("\n╔══════════════════════════════════════════════════════════╗");
    println!("║  Simulation Results                                      ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!(
        "{:<26} {:>12} {:>10} {:>10} {:>10} {:>12} {:>8} {:>8}",
        "Policy", "Energy (kJ)", "Deployed", "Completed", "Migrations", "Avg Resp (s)", "SLA", "Queue"
    );
    println!("{}", "-".repeat(104));

    for result in &results {
        println!(
            "{:<26} {:>12.2} {:>10} {:>10} {:>10} {:>12.2} {:>7.1}% {:>8}",
            result.policy_name,
            result.total_energy / 1000.0,
            result.deployed,
            result.completed,
            result.migrations,
            result.average_response_time,
            result.sla_violation_rate() * 100.0,
            result.final_queue_len,
        );
    }

    if let Some(output_path) = args.output {
        println!("\nWriting results to {}...", output_path);
        let json = serde_json::to_string_pretty(&results)?;
        fs::write(&output_path, json)?;
        println!("  Results saved");
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}
