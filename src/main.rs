use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use stain_solver::data::{DatasetCode, DatasetProvider, Datasets, ImageDirProvider, PcaIterator, StainLevel};
use stain_solver::network::{plan_jobs, registry, Hyperparams, ModelEntry, Network};
use stain_solver::train::run::unix_timestamp;
use stain_solver::train::{Run, RunOutcome, RunReport, Solver, SolverConfig};

/// Trains stain normalization models, one run per model id.
#[derive(Parser, Debug)]
#[command(name = "stain-solver", version, about, long_about = None)]
struct Cli {
    /// Model ids to train, 1-based, in order
    #[arg(short, long = "model", required = true, num_args = 1..)]
    models: Vec<i64>,

    /// Hematoxylin stain level (-1/0/1)
    #[arg(short = 'H', long, default_value_t = 1, allow_negative_numbers = true)]
    hematoxylin: i64,

    /// Eosin stain level (-1/0/1)
    #[arg(short = 'E', long, default_value_t = 1, allow_negative_numbers = true)]
    eosin: i64,

    /// Thickness level (-1/0/1)
    #[arg(short = 'T', long, default_value_t = 1, allow_negative_numbers = true)]
    thickness: i64,

    /// Comment string, used as the save directory prefix
    #[arg(short, long, default_value = "run")]
    comment: String,

    /// Per-layer learning rates and penalties
    #[arg(long, default_value = "hyperparams.json")]
    hyperparams: PathBuf,

    /// Directory holding one image folder per dataset code
    #[arg(long, default_value = "data")]
    data_root: PathBuf,

    /// Where run directories are created
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = SolverConfig::DEFAULT_EPOCHS)]
    epochs: usize,

    #[arg(long, default_value_t = SolverConfig::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Snapshot every N batches
    #[arg(long, default_value_t = SolverConfig::DEFAULT_SAVE_BATCH_FREQ)]
    save_batch_freq: usize,

    /// Snapshot and validate at least every N seconds
    #[arg(long, default_value_t = 240)]
    save_time_freq: u64,

    /// Plain-text log file
    #[arg(long, default_value = "log/stainnorm.log")]
    log_file: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dataset = DatasetCode::new(
        StainLevel::from_flag(cli.hematoxylin)?,
        StainLevel::from_flag(cli.eosin)?,
        StainLevel::from_flag(cli.thickness)?,
    );
    println!("Starting with dataset code {}", dataset);

    let _guard = init_logging(&cli.log_file, cli.verbose)?;
    info!("__START__");

    let config = SolverConfig::default()
        .with_dataset(dataset)
        .with_dir_prefix(cli.comment.clone())
        .with_epochs(cli.epochs)
        .with_batch_size(cli.batch_size)
        .with_save_freq(cli.save_batch_freq, Duration::from_secs(cli.save_time_freq));

    let models = registry();
    let jobs = plan_jobs(&cli.models, models.len());
    if jobs.is_empty() {
        warn!("No valid model ids given");
        return Ok(());
    }

    let provider = ImageDirProvider::new(&cli.data_root);
    let datasets = provider
        .load_split(&config.dataset, &config.val_keys)
        .with_context(|| format!("loading dataset {} from {}", config.dataset, cli.data_root.display()))?;
    info!(
        "Loaded dataset with {} training and {} validation images",
        datasets.train.len(),
        datasets.validation.len()
    );
    let sampler = PcaIterator::fit(datasets.train.iter().chain(&datasets.validation))?;

    // Installed only once loading is done: until then Ctrl-C terminates the process.
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = stop.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;
    let config = config.with_stop_flag(stop.clone());

    let timestamp = unix_timestamp();
    for index in jobs {
        let entry = &models[index];
        info!("Start processing job id {} for model {}", index, entry.name);
        let report = run_job(&cli, &config, entry, index, timestamp, &datasets, &sampler)?;
        match &report.outcome {
            RunOutcome::Failed(msg) => error!(model = entry.name, error = %msg, "Job failed"),
            outcome => info!(model = entry.name, ?outcome, batches = report.trace.len(), "Job finished"),
        }
        // An interrupt ends only the current job.
        stop.store(false, Ordering::SeqCst);
    }

    info!("__DONE__");
    Ok(())
}

fn run_job(
    cli: &Cli,
    config: &SolverConfig,
    entry: &ModelEntry,
    index: usize,
    timestamp: i64,
    datasets: &Datasets,
    sampler: &PcaIterator,
) -> anyhow::Result<RunReport> {
    let hyperparams = Hyperparams::load_json(&cli.hyperparams)
        .with_context(|| format!("loading {}", cli.hyperparams.display()))?;

    info!("Building graph.");
    let channels = datasets.train.first().map_or(3, |s| s.input.channels);
    let mut network = Network::build(&(entry.spec)(channels), &hyperparams, channels)
        .with_context(|| format!("building model {}", entry.name))?;

    let run = Run::create(
        &cli.output_dir,
        &config.dir_prefix,
        config.dataset,
        index.to_string(),
        index as i64,
        timestamp,
    )?;

    info!("Start with training");
    Ok(Solver::new(config.clone()).run(&mut network, &run, datasets, sampler))
}

/// Stderr plus a plain-text file layer. Keep the guard alive until exit.
fn init_logging(log_file: &Path, verbose: u8) -> anyhow::Result<WorkerGuard> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let dir = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let name = log_file
        .file_name()
        .with_context(|| format!("log file {} has no file name", log_file.display()))?;

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}
