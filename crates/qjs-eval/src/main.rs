//! QuickJS evaluator
//!
//! Runs one script in a fresh runtime and prints its result. Exit status is
//! 0 on success, 1 when the script throws, 2 when the runtime or its input
//! cannot be set up, and 124 when `--timeout-ms` elapses.

use anyhow::Context;
use clap::Parser;
use qjs_host_core::{EngineHost, HostError, RuntimeId, ValueTag};
use qjs_host_native::{NativeConfig, NativeRuntime};
use qjs_host_observability::tracing_setup;
use qjs_host_quickjs::{JsRuntime, QuickJsConfig};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

const EXIT_EXCEPTION: i32 = 1;
const EXIT_SETUP: i32 = 2;
const EXIT_TIMEOUT: i32 = 124;

#[derive(Parser, Debug)]
#[command(name = "qjs-eval")]
#[command(about = "Evaluate JavaScript in a QuickJS runtime", long_about = None)]
struct Cli {
    /// Script to run; read from stdin when neither FILE nor --eval is given.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Inline source, used instead of FILE.
    #[arg(short = 'e', long = "eval", value_name = "SOURCE")]
    source: Option<String>,

    /// Print the result through JSON.stringify.
    #[arg(long, conflicts_with = "report")]
    json: bool,

    /// Print a JSON report with the runtime id, value kind and timing.
    #[arg(long)]
    report: bool,

    /// JSON file with runtime limits; flags below override its fields.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Heap limit in bytes.
    #[arg(long, value_name = "BYTES")]
    memory_limit: Option<u64>,

    /// Stack limit in bytes.
    #[arg(long, value_name = "BYTES")]
    max_stack_size: Option<u64>,

    /// Allocation volume that triggers garbage collection.
    #[arg(long, value_name = "BYTES")]
    gc_threshold: Option<u64>,

    /// Evaluate in strict mode.
    #[arg(long)]
    strict: bool,

    /// Abort with status 124 when evaluation takes longer.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Use the prebuilt QuickJs shared library instead of the embedded engine.
    #[arg(
        long,
        conflicts_with_all = ["config", "memory_limit", "max_stack_size", "gc_threshold", "strict"]
    )]
    native: bool,

    /// Directory containing the QuickJs shared library.
    #[arg(long, value_name = "DIR", requires = "native")]
    library_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
    Report,
}

#[derive(Debug, Clone)]
enum Backend {
    Embedded(QuickJsConfig),
    Native(NativeConfig),
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Embedded(_) => "embedded",
            Backend::Native(_) => "native",
        }
    }
}

/// Everything the blocking evaluation needs.
#[derive(Debug)]
struct Job {
    source: String,
    backend: Backend,
    mode: OutputMode,
}

enum Outcome {
    Value { tag: ValueTag, output: Output },
    Exception(String),
}

enum Output {
    Text(String),
    Json(Value),
}

struct Run {
    runtime_id: RuntimeId,
    outcome: Outcome,
    elapsed: Duration,
}

#[derive(Debug, Serialize)]
struct EvalReport<'a> {
    runtime_id: RuntimeId,
    backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<ValueTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a str>,
    elapsed_ms: f64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_setup::init_tracing();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("Evaluation setup failed: {err:#}");
            eprintln!("Error: {err:#}");
            EXIT_SETUP
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let job = prepare(&cli)?;
    let backend = job.backend.name();
    let mode = job.mode;
    info!(backend, source_len = job.source.len(), "Evaluating script");

    let task = tokio::task::spawn_blocking(move || execute(&job));
    let joined = match cli.timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), task).await {
            Ok(joined) => joined,
            Err(_) => {
                // The engine has no interrupt hook; leaving the process is
                // the only way to stop the blocking thread.
                error!(timeout_ms = ms, "Evaluation timed out");
                eprintln!("Timed out after {ms} ms");
                std::process::exit(EXIT_TIMEOUT);
            }
        },
        None => task.await,
    };
    let run = match joined.context("Evaluation task failed")? {
        Ok(run) => run,
        Err(HostError::Exception(message)) => {
            eprintln!("Uncaught {message}");
            return Ok(EXIT_EXCEPTION);
        }
        Err(err) => return Err(err).context("Failed to evaluate script"),
    };

    print_run(&run, backend, mode)?;
    Ok(match run.outcome {
        Outcome::Value { .. } => 0,
        Outcome::Exception(_) => EXIT_EXCEPTION,
    })
}

fn prepare(cli: &Cli) -> anyhow::Result<Job> {
    let source = read_source(cli)?;
    let backend = if cli.native {
        Backend::Native(NativeConfig {
            library_dir: cli.library_dir.clone(),
        })
    } else {
        Backend::Embedded(quickjs_config(cli)?)
    };
    let mode = if cli.report {
        OutputMode::Report
    } else if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    Ok(Job {
        source,
        backend,
        mode,
    })
}

fn read_source(cli: &Cli) -> anyhow::Result<String> {
    if let Some(source) = &cli.source {
        return Ok(source.clone());
    }
    match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read script from stdin")?;
            Ok(source)
        }
    }
}

fn quickjs_config(cli: &Cli) -> anyhow::Result<QuickJsConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str::<QuickJsConfig>(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => QuickJsConfig::default(),
    };
    if cli.memory_limit.is_some() {
        config.memory_limit = cli.memory_limit;
    }
    if cli.max_stack_size.is_some() {
        config.max_stack_size = cli.max_stack_size;
    }
    if cli.gc_threshold.is_some() {
        config.gc_threshold = cli.gc_threshold;
    }
    config.strict |= cli.strict;
    Ok(config)
}

fn execute(job: &Job) -> Result<Run, HostError> {
    let started = Instant::now();
    let (runtime_id, outcome) = match &job.backend {
        Backend::Embedded(config) => {
            let runtime = JsRuntime::create_with_config(config.clone())?;
            let outcome = evaluate(&runtime, &job.source, job.mode)?;
            (runtime.id(), outcome)
        }
        Backend::Native(config) => {
            let runtime = NativeRuntime::create_with_config(config)?;
            let outcome = evaluate(&runtime, &job.source, job.mode)?;
            (runtime.id(), outcome)
        }
    };
    Ok(Run {
        runtime_id,
        outcome,
        elapsed: started.elapsed(),
    })
}

fn evaluate<H: EngineHost>(
    host: &H,
    source: &str,
    mode: OutputMode,
) -> Result<Outcome, HostError> {
    let value = host.eval(source)?;
    if host.is_exception(&value) {
        return Ok(Outcome::Exception(host.get_exception()?));
    }

    let tag = host.value_tag(&value);
    let output = match mode {
        OutputMode::Text => Output::Text(host.coerce_string(&value)?),
        OutputMode::Json | OutputMode::Report => Output::Json(match host.json_stringify(&value)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Value::Null,
        }),
    };
    Ok(Outcome::Value { tag, output })
}

fn print_run(run: &Run, backend: &'static str, mode: OutputMode) -> anyhow::Result<()> {
    if mode == OutputMode::Report {
        let (tag, result, exception) = match &run.outcome {
            Outcome::Value {
                tag,
                output: Output::Json(value),
            } => (Some(*tag), Some(value), None),
            Outcome::Value { tag, .. } => (Some(*tag), None, None),
            Outcome::Exception(message) => (None, None, Some(message.as_str())),
        };
        let report = EvalReport {
            runtime_id: run.runtime_id,
            backend,
            tag,
            result,
            exception,
            elapsed_ms: run.elapsed.as_secs_f64() * 1000.0,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to encode report")?
        );
    }

    match &run.outcome {
        Outcome::Exception(message) => eprintln!("Uncaught {message}"),
        Outcome::Value { .. } if mode == OutputMode::Report => {}
        Outcome::Value {
            output: Output::Text(text),
            ..
        } => println!("{text}"),
        Outcome::Value {
            output: Output::Json(value),
            ..
        } => println!("{value}"),
    }
    Ok(())
}
