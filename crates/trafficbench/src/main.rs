use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use serde::Serialize;

use trafficbench::experiment::{Experiment, SchemaSpec, SimulatorSettings};
use trafficbench::{SweepReport, init_logging, write_results};
use trafficbench_core::analysis::Sweep;
use trafficbench_core::{
    MetricsRecord, MetricsSchema, ProcessRunner, RunProgress, SimulationConfig, Simulator, encode,
    run_average_with_progress,
};

#[derive(Parser, Debug)]
#[command(name = "trafficbench")]
#[command(about = "Run, average and sweep a cellular-automaton traffic simulator")]
struct Args {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Also write logs to {log_dir}/trafficbench.log
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// How to invoke the simulator, shared by run/average/sweep
#[derive(clap::Args, Debug)]
struct SimulatorArgs {
    /// Simulator program, optionally with leading arguments ("cargo run --release --")
    #[arg(short, long)]
    binary: Option<String>,

    /// Built-in schema revision to validate output against (see `schemas`)
    #[arg(long)]
    schema: Option<String>,

    /// Kill a simulator run after this many seconds
    #[arg(long)]
    timeout_secs: Option<f64>,
}

impl SimulatorArgs {
    /// Command-line values take precedence over `settings`
    fn apply_to(&self, mut settings: SimulatorSettings) -> SimulatorSettings {
        if let Some(binary) = &self.binary {
            settings.binary = binary.clone();
        }
        if let Some(schema) = &self.schema {
            settings.schema = Some(SchemaSpec::Builtin(schema.clone()));
        }
        if self.timeout_secs.is_some() {
            settings.timeout_secs = self.timeout_secs;
        }
        settings
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the arguments a configuration encodes to, without running anything
    Encode {
        /// Simulation configuration (YAML)
        config: PathBuf,
    },
    /// Run the simulator once and print its metrics as JSON
    Run {
        config: PathBuf,
        #[command(flatten)]
        simulator: SimulatorArgs,
    },
    /// Run the simulator N times and print the mean metrics as JSON
    Average {
        config: PathBuf,
        /// Number of runs to average
        #[arg(short = 'n', long, default_value_t = 10)]
        repeats: usize,
        #[command(flatten)]
        simulator: SimulatorArgs,
    },
    /// Run a sweep experiment and write {out_dir}/{name}.json and .csv
    Sweep {
        /// Experiment file (YAML)
        experiment: PathBuf,
        #[arg(short, long, default_value = "output")]
        out_dir: PathBuf,
        /// Worker pool size (1 = sequential, 0 = one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,
        #[command(flatten)]
        simulator: SimulatorArgs,
    },
    /// List the built-in output schema revisions
    Schemas,
}

#[derive(Serialize)]
struct AverageOutput<'a> {
    runs: usize,
    mean: &'a MetricsRecord,
}

fn load_config(path: &Path) -> color_eyre::Result<SimulationConfig> {
    let yaml = fs::read_to_string(path)
        .wrap_err_with(|| format!("cannot read config {}", path.display()))?;
    serde_saphyr::from_str(&yaml).wrap_err_with(|| format!("invalid config {}", path.display()))
}

/// Install a Ctrl-C handler that cancels `progress`
fn cancel_on_ctrl_c(progress: &RunProgress) -> color_eyre::Result<()> {
    let progress = progress.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling");
        progress.cancel();
    })
    .wrap_err("cannot install Ctrl-C handler")
}

fn runner_for(
    simulator: &SimulatorArgs,
    progress: &RunProgress,
) -> color_eyre::Result<ProcessRunner> {
    let settings = simulator.apply_to(SimulatorSettings::default());
    Ok(settings.runner()?.with_cancel_flag(progress.cancel_flag()))
}

fn run_once(config: &Path, simulator: &SimulatorArgs) -> color_eyre::Result<()> {
    let config = load_config(config)?;
    let progress = RunProgress::new(1);
    cancel_on_ctrl_c(&progress)?;

    let runner = runner_for(simulator, &progress)?;
    let record = runner
        .run(&config)
        .wrap_err_with(|| format!("`{}` failed", config.command_line()))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn run_average(config: &Path, repeats: usize, simulator: &SimulatorArgs) -> color_eyre::Result<()> {
    let config = load_config(config)?;
    let progress = RunProgress::new(repeats);
    cancel_on_ctrl_c(&progress)?;

    let runner = runner_for(simulator, &progress)?;
    let started = Instant::now();
    let result = run_average_with_progress(&runner, &config, repeats, Some(&progress))?;
    tracing::info!(runs = result.runs(), elapsed = ?started.elapsed(), "average finished");

    let output = AverageOutput {
        runs: result.runs(),
        mean: result.mean(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_sweep(
    path: &Path,
    out_dir: &Path,
    workers: Option<usize>,
    simulator: &SimulatorArgs,
) -> color_eyre::Result<()> {
    let mut experiment = Experiment::load(path)?;
    experiment.simulator = simulator.apply_to(experiment.simulator);
    if workers.is_some() {
        experiment.workers = workers;
    }
    experiment.validate()?;

    let progress = RunProgress::default();
    cancel_on_ctrl_c(&progress)?;

    let runner = experiment
        .simulator
        .runner()?
        .with_cancel_flag(progress.cancel_flag());
    let sweep_config = experiment.sweep_config();
    let selectors = experiment.selectors()?;

    let mut sweep = Sweep::with_planner(&sweep_config, |coordinates| {
        experiment.plan_point(coordinates)
    });
    if let Some(filter) = &experiment.filter {
        sweep = sweep.filter(filter.predicate()?);
    }

    tracing::info!(
        experiment = %experiment.name,
        simulator = %experiment.simulator.binary,
        "running sweep"
    );
    let started = Instant::now();
    let done = AtomicBool::new(false);
    let results = thread::scope(|s| {
        s.spawn(|| report_progress(&progress, &done));
        let results = sweep.run(&runner, Some(&progress));
        done.store(true, Ordering::Relaxed);
        results
    })
    .wrap_err_with(|| format!("sweep `{}` failed", experiment.name))?;
    let elapsed = started.elapsed();

    let series = results.series(&selectors)?;
    for i in 0..series.len() {
        let row = series.row(i).unwrap_or_default();
        let cells: Vec<String> = series
            .labels()
            .zip(&row)
            .map(|(label, value)| format!("{label}={value:.4}"))
            .collect();
        println!("{}", cells.join("  "));
    }

    let report = SweepReport::new(
        &experiment.name,
        &experiment.simulator.binary,
        experiment.repeats,
        &results,
        &series,
        elapsed,
    );
    let [json_path, csv_path] = write_results(out_dir, &report)?;

    tracing::info!(
        kept = results.len(),
        evaluated = results.evaluated,
        runs = results.total_runs(),
        "total time: {:.2?}",
        elapsed
    );
    tracing::info!("wrote {} and {}", json_path.display(), csv_path.display());
    Ok(())
}

/// Log `completed/total` every few seconds until `done` is set
fn report_progress(progress: &RunProgress, done: &AtomicBool) {
    const INTERVAL: Duration = Duration::from_secs(5);
    const TICK: Duration = Duration::from_millis(100);

    let mut last_report = Instant::now();
    while !done.load(Ordering::Relaxed) && !progress.is_cancelled() {
        thread::sleep(TICK);
        if last_report.elapsed() >= INTERVAL {
            tracing::info!("progress: {}/{}", progress.completed(), progress.total());
            last_report = Instant::now();
        }
    }
}

fn print_schemas() {
    for schema in MetricsSchema::builtin() {
        println!("{}", schema.revision);
        for field in &schema.fields {
            println!("  {:<48} {:?}", field.name, field.kind);
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(args.log_dir.as_deref(), &args.log_level)?;

    match &args.command {
        Command::Encode { config } => {
            let config = load_config(config)?;
            println!("{}", encode(&config).join(" "));
        }
        Command::Run { config, simulator } => run_once(config, simulator)?,
        Command::Average {
            config,
            repeats,
            simulator,
        } => run_average(config, *repeats, simulator)?,
        Command::Sweep {
            experiment,
            out_dir,
            workers,
            simulator,
        } => run_sweep(experiment, out_dir, *workers, simulator)?,
        Command::Schemas => print_schemas(),
    }

    Ok(())
}
