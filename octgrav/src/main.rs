use octgrav::{bench_forces, bench_theta, NVec3, Scenario, ScenarioConfig};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(about = "Barnes-Hut octree gravity simulation")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario file
    Run {
        /// Scenario YAML, looked up in `scenarios/` if not found as given
        #[arg(short, default_value = "two_body.yaml")]
        file_name: String,
        /// Override the scenario's step count
        #[arg(long)]
        steps: Option<usize>,
    },
    /// Time direct summation against Barnes-Hut
    Bench {
        /// Also sweep theta for this many particles
        #[arg(long)]
        theta_sweep: Option<usize>,
    },
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let given = PathBuf::from(file_name);
    let config_path = if given.exists() {
        given
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };

    let file = File::open(&config_path)
        .with_context(|| format!("failed to open scenario {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("failed to parse scenario {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn run(file_name: &str, steps: Option<usize>) -> Result<()> {
    let scenario_cfg = load_scenario_from_yaml(file_name)?;
    let mut scenario = Scenario::build_scenario(scenario_cfg).context("failed to build scenario")?;
    let steps = steps.unwrap_or(scenario.steps);

    let start = Instant::now();
    let log_every = (steps / 10).max(1);

    for frame in 0..steps {
        let report = scenario.step().with_context(|| format!("step {} failed", frame))?;

        if frame % log_every == 0 || frame + 1 == steps {
            let com = scenario.store.center_of_mass().unwrap_or_else(NVec3::zeros);
            log::info!(
                "frame {:5}: {} direct, {} approximated, com = ({:.4}, {:.4}, {:.4})",
                frame, report.interactions.direct, report.interactions.approximated, com.x, com.y, com.z
            );
        }
    }

    log::info!("finished {} steps in {} ms", steps, start.elapsed().as_millis());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Run { file_name, steps } => run(&file_name, steps)?,
        Command::Bench { theta_sweep } => {
            bench_forces();
            if let Some(n) = theta_sweep {
                bench_theta(n);
            }
        }
    }

    Ok(())
}
