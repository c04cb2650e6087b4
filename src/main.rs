/*!
 * Ferry CLI - Command Line Interface
 */

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use ferry::{
    cancel::CancelToken,
    config::{EngineConfig, LogLevel},
    core::catalog::{item_for_path, Catalog},
    core::progress::{ProgressEvent, ProgressPublisher, ProgressSubscriber},
    error::{FerryError, Result, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    metadata::resolve_record_pid,
    output::SummaryWriter,
    update::{HttpFetcher, UpdateOutcome, Updater},
    HttpCatalogStore, InterruptPolicy, MetadataSource, SyncOrchestrator, UploadRequestSource,
};

/// Default config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "ferry.toml";

#[derive(Parser)]
#[command(name = "ferry")]
#[command(version, about = "Upload files to a catalog-backed data store and keep the client current", long_about = None)]
struct Cli {
    /// Configuration file (default: ./ferry.toml when present)
    #[arg(short = 'C', long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Emit summaries as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files to a collection record on the remote store
    Upload {
        /// Metadata source file describing the record and its files
        #[arg(short = 'm', long = "metadata", value_name = "FILE")]
        metadata: Option<PathBuf>,

        /// Identifier of an existing record, used when the metadata source
        /// has none recorded
        #[arg(short = 'p', long = "pid", value_name = "PID")]
        pid: Option<String>,

        /// Additional file(s) to upload; the target name is the file name
        #[arg(short = 'f', long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Skip the self-update check before uploading
        #[arg(long)]
        skip_update: bool,

        /// Abort the batch when the pacing delay is interrupted, instead of
        /// resuming with the next item
        #[arg(long)]
        abort_on_interrupt: bool,
    },

    /// Check the remote manifest and update this installation
    Update {
        /// Update even when the fetched version is not newer, and ignore
        /// manifest freshness
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FATAL;
        }
    };
    if cli.verbose {
        config.log_level = LogLevel::Debug;
    }

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Error: {}", e);
        return EXIT_FATAL;
    }

    let writer = SummaryWriter::new(cli.json);
    let result = match cli.command {
        Command::Upload {
            metadata,
            pid,
            files,
            skip_update,
            abort_on_interrupt,
        } => upload_command(
            &config,
            metadata.as_deref(),
            pid,
            &files,
            skip_update,
            abort_on_interrupt,
            &writer,
        ),
        Command::Update { force } => update_command(&config, force, &writer),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    match explicit {
        Some(path) => EngineConfig::load(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                EngineConfig::load(default)
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}

fn update_command(config: &EngineConfig, force: bool, writer: &SummaryWriter) -> Result<i32> {
    let outcome = run_self_update(config, force)?;
    writer.update_summary(&outcome);
    Ok(EXIT_SUCCESS)
}

fn run_self_update(config: &EngineConfig, force: bool) -> Result<UpdateOutcome> {
    config.validate_for_update()?;

    let fetcher = HttpFetcher::new(
        config.http_timeout(),
        config.retry_attempts,
        config.retry_backoff(),
        CancelToken::new(),
    );
    let base_dir = installation_dir(config)?;
    let updater = Updater::new(&fetcher, &config.manifest_url, base_dir)
        .with_force(force)
        .with_check_interval(config.update_check_interval());
    updater.run()
}

fn installation_dir(config: &EngineConfig) -> Result<PathBuf> {
    if let Some(ref dir) = config.install_dir {
        return Ok(dir.clone());
    }
    std::env::current_exe()?
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| FerryError::Config("cannot determine installation directory".to_string()))
}

#[allow(clippy::too_many_arguments)]
fn upload_command(
    config: &EngineConfig,
    metadata: Option<&Path>,
    pid_arg: Option<String>,
    files: &[PathBuf],
    skip_update: bool,
    abort_on_interrupt: bool,
    writer: &SummaryWriter,
) -> Result<i32> {
    // Self-update runs first so a stale client never talks to the store,
    // but its failure is not allowed to block the user's upload.
    if skip_update {
        tracing::debug!("self-update check skipped by flag");
    } else if config.manifest_url.is_empty() {
        tracing::debug!("no manifest_url configured, skipping self-update check");
    } else if let Err(e) = run_self_update(config, false) {
        tracing::warn!(error = %e, "self-update check failed, continuing with upload");
    }

    config.validate_for_upload()?;

    let cancel = CancelToken::new();
    // Credential resolution happens here, before any network call
    let store = HttpCatalogStore::new(config, cancel.clone())?;

    let mut catalog = Catalog::new();
    let mut pid = pid_arg;

    if let Some(metadata_path) = metadata {
        let mut source = MetadataSource::load(metadata_path)?;
        // An explicit --pid stands in only when the source has none recorded;
        // a recorded pid always wins and never re-creates the record.
        if source.pid().is_some() || pid.is_none() {
            pid = Some(resolve_record_pid(&mut source, &store)?);
        }
        catalog.extend(source.items()?);
    }

    let pid = match pid {
        Some(p) => p,
        None => {
            return Err(FerryError::Config(
                "no pid available: provide a metadata file or pass --pid".to_string(),
            ))
        }
    };

    // Command-line files land after metadata-file items, so they override
    // entries with the same target name
    for path in files {
        catalog.insert(item_for_path(path));
    }

    if catalog.is_empty() {
        println!("Nothing to upload.");
        return Ok(EXIT_SUCCESS);
    }

    let (publisher, subscriber) = ProgressPublisher::unbounded();
    let progress_logger = spawn_progress_logger(subscriber);

    let policy = if abort_on_interrupt {
        InterruptPolicy::Abort
    } else {
        InterruptPolicy::Resume
    };

    let result = {
        let orchestrator = SyncOrchestrator::new(&store, config)
            .with_cancel(cancel)
            .with_publisher(publisher)
            .with_interrupt_policy(policy);
        orchestrator.run(&pid, &catalog)
    };
    // All publisher clones are gone once the orchestrator drops
    progress_logger.join().ok();

    writer.batch_summary(&pid, &result);
    Ok(if result.has_failures() {
        EXIT_PARTIAL
    } else {
        EXIT_SUCCESS
    })
}

/// Drain progress events into debug logs; rendering proper belongs to a
/// front-end collaborator
fn spawn_progress_logger(subscriber: ProgressSubscriber) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for event in subscriber.iter() {
            if let ProgressEvent::ReadProgress {
                source,
                percent,
                throughput_bps,
                ..
            } = event
            {
                tracing::debug!(
                    source = %source.display(),
                    percent,
                    kib_per_sec = (throughput_bps / 1024.0) as u64,
                    "transfer progress"
                );
            }
        }
    })
}
