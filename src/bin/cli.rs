use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use manifest_runner::bundle::BundleLoader;
use manifest_runner::prelude::*;
use tracing_subscriber::EnvFilter;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "manifest-runner")]
#[command(about = "Run deployment and verification manifests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to runner.yaml (default: <WORKSPACE>/runner.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set a variable for expansion and scripts (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val, global = true)]
    env: Vec<(String, String)>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a manifest
    Run {
        /// Path to the manifest file
        #[arg(value_name = "MANIFEST")]
        file: PathBuf,

        /// Directory that config= resources resolve against (default: the manifest's directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Write the run report as JSON to this file
        #[arg(short, long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Validate manifest files without running them
    Validate {
        /// Path to a manifest file or a directory of manifests
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Print the parsed steps of a manifest
    List {
        /// Path to the manifest file
        #[arg(value_name = "MANIFEST")]
        file: PathBuf,
    },

    /// Print a fully resolved bundle target
    ResolveBundle {
        /// Path to the bundle template file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Template to resolve
        #[arg(value_name = "TARGET")]
        target: String,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "manifest_runner=debug"
    } else {
        "manifest_runner=info"
    }
}

#[cfg(feature = "otel")]
fn init_otel_tracing(verbose: bool) {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::runtime::Tokio;
    use opentelemetry_sdk::trace::TracerProvider;

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp_endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("OTLP exporter unavailable ({}), logging locally only", e);
            init_tracing(verbose);
            return;
        }
    };

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .build();

    let tracer = provider.tracer("manifest-runner");
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(EnvFilter::new(log_filter(verbose)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(otel_layer)
        .init();

    opentelemetry::global::set_tracer_provider(provider);
}

/// Logs go to stderr so `list` and `resolve-bundle` output can be piped
fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter(verbose)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(feature = "otel")]
    init_otel_tracing(cli.verbose);

    #[cfg(not(feature = "otel"))]
    init_tracing(cli.verbose);

    let result = run(cli).await;

    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "manifest-runner failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let options = GlobalOptions {
        config: cli.config,
        env: cli.env,
    };

    match cli.command {
        Commands::Run {
            file,
            workspace,
            report,
        } => run_manifest(&options, file, workspace, report).await,
        Commands::Validate { path } => validate(&options, path),
        Commands::List { file } => list_steps(&options, file),
        Commands::ResolveBundle { file, target } => resolve_bundle(file, &target),
    }
}

struct GlobalOptions {
    config: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl GlobalOptions {
    /// Explicit --config, else runner.yaml in `dir` when present, else defaults
    fn runner_config(&self, dir: &Path) -> anyhow::Result<RunnerConfig> {
        match &self.config {
            Some(path) => Ok(RunnerConfig::load(path)?),
            None => {
                let candidate = dir.join("runner.yaml");
                if candidate.is_file() {
                    Ok(RunnerConfig::load(candidate)?)
                } else {
                    Ok(RunnerConfig::default())
                }
            }
        }
    }

    /// Process environment, then runner.yaml `env:`, then -e flags
    fn environment(&self, config: &RunnerConfig) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = std::env::vars().collect();
        env.extend(config.env.clone());
        env.extend(self.env.iter().cloned());
        env
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn run_manifest(
    options: &GlobalOptions,
    file: PathBuf,
    workspace: Option<PathBuf>,
    report_path: Option<PathBuf>,
) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Manifest not found: {}", file.display());
    }

    let workspace = workspace.unwrap_or_else(|| parent_dir(&file));
    let config = options.runner_config(&workspace)?;
    let env = options.environment(&config);

    let manifest = ManifestLoader::load_file(&file, &env)?;
    let registry = StepRegistry::with_builtin_handlers(&config);
    registry.validate(&manifest)?;

    let context = RunContext::new(env, registry).with_workspace(&workspace);
    let report = Executor::new(context)
        .with_default_timeout(config.default_timeout)
        .run(&manifest)
        .await;

    print_report(&report, &manifest);

    if let Some(path) = report_path {
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("\nReport written to {}", path.display());
    }

    Ok(report.success())
}

fn validate(options: &GlobalOptions, path: PathBuf) -> anyhow::Result<bool> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }

    let dir = if path.is_dir() {
        path.clone()
    } else {
        parent_dir(&path)
    };
    let config = options.runner_config(&dir)?;
    let env = options.environment(&config);
    let registry = StepRegistry::with_builtin_handlers(&config);

    if path.is_dir() {
        let manifests = ManifestLoader::load_directory(&path, &env)?;
        if manifests.is_empty() {
            println!("No manifests found in: {}", path.display());
            return Ok(true);
        }

        for manifest in &manifests {
            registry.validate(manifest)?;
        }
        let steps: usize = manifests.iter().map(Manifest::len).sum();
        println!("✓ {} manifests validated, {} steps", manifests.len(), steps);
    } else {
        let manifest = ManifestLoader::load_file(&path, &env)?;
        registry.validate(&manifest)?;
        println!("✓ {} is valid ({} steps)", path.display(), manifest.len());
    }

    Ok(true)
}

fn list_steps(options: &GlobalOptions, file: PathBuf) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Manifest not found: {}", file.display());
    }

    let config = options.runner_config(&parent_dir(&file))?;
    let manifest = ManifestLoader::load_file(&file, &options.environment(&config))?;
    print!("{}", manifest);

    Ok(true)
}

fn resolve_bundle(file: PathBuf, target: &str) -> anyhow::Result<bool> {
    let templates = BundleLoader::load_file(&file)?;
    let bundle = manifest_runner::resolve_bundle(target, &templates)?;
    print!("{}", bundle.to_yaml()?);

    Ok(true)
}

fn print_report(report: &RunReport, manifest: &Manifest) {
    println!("\n=== Run Result ===\n");
    println!("Manifest: {}", report.manifest);
    println!("Success: {}", if report.success() { "YES" } else { "NO" });
    println!("Run ID: {}\n", report.run_id);

    for (result, step) in report.results.iter().zip(manifest.iter()) {
        let status = match result.status {
            StepStatus::Success => "✓",
            StepStatus::Failure if !result.fatal => "!",
            StepStatus::Failure => "✗",
            StepStatus::Skipped => "-",
        };
        println!(
            "  {} Step {}: {} ({} ms)",
            status,
            result.index + 1,
            step.to_line(),
            result.duration.as_millis()
        );
        match result.status {
            StepStatus::Failure => {
                if let Some(message) = &result.message {
                    println!("      Error: {}", message);
                }
                if result.attempts > 1 {
                    println!("      Attempts: {}", result.attempts);
                }
            }
            StepStatus::Skipped => println!("      Skipped"),
            StepStatus::Success => {}
        }
    }

    println!(
        "\n{} passed, {} failed, {} skipped",
        report.count(StepStatus::Success),
        report.count(StepStatus::Failure),
        report.count(StepStatus::Skipped)
    );
}
