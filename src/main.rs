//! depimpact - breaking dependency upgrade impact analyzer
//!
//! Single-shot mode prints a report of breaking and outdated dependencies and
//! the source lines that use them. `--watch` keeps polling the registry and
//! streams change events as JSON lines until interrupted.

use clap::Parser;
use depimpact::cli::CliArgs;
use depimpact::config::{validate_repository, FileConfig, Settings};
use depimpact::error::{AppError, IoError};
use depimpact::fixer::{ChatCompletionsFixer, MigrationFixer};
use depimpact::output::{create_formatter, EventWriter, OutputConfig, TextFormatter, Verbosity};
use depimpact::pipeline::{watch_queue_capacity, watch_updates, Pipeline, PipelineOutcome};
use depimpact::registry::{HttpClient, PyPIAdapter, RegistryAdapter};
use depimpact::scanner::CodeScanner;
use depimpact::stream::{EventBroadcaster, StreamController};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status when `--fail-on-breaking` is set and breaking changes were found
const EXIT_BREAKING: u8 = 2;

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_env("DEPIMPACT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let root = validate_repository(&args.path).map_err(AppError::from)?;
    let file_config = FileConfig::discover(&root, args.config.as_deref()).map_err(AppError::from)?;
    let settings = Settings::resolve(&args.overrides(), file_config).map_err(AppError::from)?;

    if args.verbose {
        eprintln!("depimpact v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Target: {}", root.display());
    }

    let client = HttpClient::new().map_err(AppError::from)?;
    let registry: Arc<dyn RegistryAdapter> = Arc::new(PyPIAdapter::with_base_url(
        client.clone(),
        &settings.registry_url,
    ));

    let mut pipeline = Pipeline::new(&root, Arc::clone(&registry))
        .with_scanner(CodeScanner::new().with_exclude_dirs(settings.exclude_dirs.clone()))
        .with_concurrency(settings.concurrency)
        .with_only(args.only.clone())
        .with_progress(!args.quiet && !args.json && !args.watch);

    if args.ai {
        let fixer = ChatCompletionsFixer::new(client)
            .with_endpoint(&settings.fixer.endpoint)
            .with_model(&settings.fixer.model)
            .with_api_key_from_env(&settings.fixer.api_key_env);
        if !fixer.has_api_key() {
            warn!(
                "{} is not set; fix requests will be sent without credentials",
                settings.fixer.api_key_env
            );
        }
        let fixer: Arc<dyn MigrationFixer> = Arc::new(fixer);
        pipeline = pipeline.with_fixer(fixer, settings.fixer.max_fixes_per_package);
    }

    if args.watch {
        return watch(args, pipeline, registry, &settings).await;
    }

    let outcome = pipeline.run().await;
    write_report(&args, &outcome)?;

    if args.fail_on_breaking && outcome.report.has_breaking() {
        Ok(ExitCode::from(EXIT_BREAKING))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn write_report(args: &CliArgs, outcome: &PipelineOutcome) -> anyhow::Result<()> {
    let config = OutputConfig::from_cli(args.json, args.verbose, args.quiet, args.output.is_some());
    let formatter = create_formatter(config);

    match &args.output {
        Some(path) => {
            let io_error = |e| AppError::from(IoError::generic(path, e));
            let mut file = std::fs::File::create(path).map_err(io_error)?;
            formatter
                .format(&outcome.report, &mut file)
                .and_then(|()| file.flush())
                .map_err(io_error)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            formatter.format(&outcome.report, &mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Runs the pipeline once, then streams registry changes until Ctrl-C
async fn watch(
    args: CliArgs,
    pipeline: Pipeline,
    registry: Arc<dyn RegistryAdapter>,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    // events queue up unread until the single-shot run finishes
    let manifests = pipeline.load_manifests();
    let capacity = watch_queue_capacity(manifests.dependencies.len());
    let broadcaster = Arc::new(EventBroadcaster::with_capacity(capacity));
    let events = broadcaster.subscribe();

    let outcome = pipeline
        .with_broadcaster(Arc::clone(&broadcaster))
        .run_loaded(manifests)
        .await;

    let controller = Arc::new(
        StreamController::new(registry, outcome.dependencies.clone())
            .with_broadcaster(broadcaster)
            .with_interval(settings.poll_interval)
            .with_concurrency(settings.concurrency),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let impact_formatter = TextFormatter::with_color(Verbosity::Normal, true);
    let show_impacts = !args.quiet;
    let mut writer = EventWriter::new(io::stdout());

    watch_updates(
        controller,
        events,
        &outcome.usages,
        cancel,
        &mut writer,
        |impact| {
            if show_impacts {
                let mut stderr = io::stderr().lock();
                if let Err(e) = impact_formatter.format_impact(impact, &mut stderr) {
                    warn!("Failed to print impact for {}: {}", impact.package, e);
                }
            }
        },
    )
    .await?;

    Ok(ExitCode::SUCCESS)
}
