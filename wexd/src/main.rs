//! # WEX Driver (wexd)
//!
//! Command-line entry point for the WEX WebAssembly toolchain:
//!
//! ```bash
//! # Run a module's start function, or a chosen export
//! wexd run module.wasm --invoke add 2 40
//!
//! # Run reference test scripts
//! wexd script tests/core/memory.wast
//!
//! # Explore a function symbolically
//! wexd sym module.wat probe
//! ```
//!
//! Exit code 0 on success; non-zero with a message on stderr otherwise.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{Level, LevelFilter, Metadata, Record};

use wex_runtime::{ConcreteEval, Engine, ExecConfig, ExternVal, Value};
use wex_script::{prepare_module, spectest_module, ScriptRunner};
use wex_sym::{Explorer, FoldSolver, PathOutcome};

/// WEX - WebAssembly execution toolchain
#[derive(Parser)]
#[command(name = "wexd")]
#[command(version, about = "WEX - execute WebAssembly concretely or symbolically")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable trace logging
    #[arg(long, global = true)]
    debug: bool,

    /// Simplify symbolic expressions eagerly
    #[arg(long, global = true)]
    optimize: bool,

    /// Report execution statistics after the run
    #[arg(long, global = true)]
    profiling: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a module, link it, and run its start function or an export
    Run {
        /// The module file (.wasm, .wat)
        file: PathBuf,

        /// Exported function to invoke after linking
        #[arg(long)]
        invoke: Option<String>,

        /// Arguments for the invoked function
        args: Vec<String>,
    },
    /// Run reference test scripts (.wast)
    Script {
        /// The script files
        files: Vec<PathBuf>,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Explore an exported function symbolically
    Sym {
        /// The module file (.wasm, .wat)
        file: PathBuf,

        /// The exported function to explore
        entry: String,

        /// Bound on explored paths
        #[arg(long, default_value_t = 256)]
        max_paths: usize,
    },
}

/// Minimal logger writing levelled lines to stderr.
struct CliLogger;

impl log::Log for CliLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            let level = match record.level() {
                Level::Error => "ERROR".red(),
                Level::Warn => "WARN".yellow(),
                Level::Info => "INFO".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".dimmed(),
            };
            eprintln!("[{level}] {}", record.args());
        }
    }

    fn flush(&self) {}
}

fn main() {
    let cli = Cli::parse();

    let _ = log::set_boxed_logger(Box::new(CliLogger));
    log::set_max_level(if cli.debug {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    });

    if let Err(err) = dispatch(cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn exec_config(cli: &Cli) -> ExecConfig {
    ExecConfig {
        debug: cli.debug,
        optimize: cli.optimize,
        profiling: cli.profiling,
        ..ExecConfig::default()
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = exec_config(&cli);
    match &cli.command {
        Commands::Run { file, invoke, args } => run_module(file, invoke.as_deref(), args, &config),
        Commands::Script { files, json } => run_scripts(files, *json, &config),
        Commands::Sym {
            file,
            entry,
            max_paths,
        } => {
            let mut config = config;
            config.max_paths = *max_paths;
            run_symbolic(file, entry, &config)
        }
    }
}

/// Reads a module file, assembling text formats to binary.
fn load_module_bytes(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.starts_with(b"\0asm") {
        return Ok(bytes);
    }
    let source = String::from_utf8(bytes)
        .with_context(|| format!("{} is neither binary wasm nor UTF-8 text", path.display()))?;
    let buf = wast::parser::ParseBuffer::new(&source).map_err(|e| anyhow!("{e}"))?;
    let mut wat = wast::parser::parse::<wast::Wat>(&buf).map_err(|e| anyhow!("{e}"))?;
    Ok(wat.encode()?)
}

fn run_module(
    file: &Path,
    invoke: Option<&str>,
    raw_args: &[String],
    config: &ExecConfig,
) -> Result<()> {
    let bytes = load_module_bytes(file)?;
    let (module, index) = prepare_module(&bytes).map_err(|e| anyhow!("{e}"))?;

    let mut engine = Engine::new(ConcreteEval::new(), config.clone());
    engine.install_host_module(spectest_module());
    let instance = engine
        .instantiate(&module, &index)
        .map_err(|e| anyhow!("{e}"))?;

    if let Some(name) = invoke {
        let args = parse_args(&engine, instance, name, raw_args)?;
        let results = engine
            .invoke(instance, name, &args)
            .map_err(|e| anyhow!("{e}"))?;
        let results = engine.concrete_results(&results).map_err(|e| anyhow!("{e}"))?;
        for value in results {
            println!("{value}");
        }
    }

    if config.profiling {
        report_stats(&engine);
    }
    Ok(())
}

/// Parses CLI arguments against the invoked function's parameter types.
fn parse_args(
    engine: &Engine<ConcreteEval>,
    instance: usize,
    name: &str,
    raw: &[String],
) -> Result<Vec<Value>> {
    let Some(ExternVal::Func(addr)) = engine.store.instance(instance)?.exports.get(name).copied()
    else {
        bail!("unknown export {name}");
    };
    let ty = engine.store.func(addr)?.ty().clone();
    if ty.params.len() != raw.len() {
        bail!(
            "{name} expects {} argument(s), got {}",
            ty.params.len(),
            raw.len()
        );
    }
    ty.params
        .iter()
        .zip(raw)
        .map(|(ty, raw)| {
            use wex_format::types::ValueType;
            let value = match ty {
                ValueType::I32 => Value::I32(raw.parse()?),
                ValueType::I64 => Value::I64(raw.parse()?),
                ValueType::F32 => Value::F32(raw.parse()?),
                ValueType::F64 => Value::F64(raw.parse()?),
                other => bail!("cannot pass {other} from the command line"),
            };
            Ok(value)
        })
        .collect()
}

fn run_scripts(files: &[PathBuf], json: bool, config: &ExecConfig) -> Result<()> {
    if files.is_empty() {
        bail!("no script files given");
    }
    let mut total_failed = 0usize;
    for file in files {
        let source =
            fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let mut runner = ScriptRunner::new(config.clone());
        let stats = runner.run_script(&source, &file.display().to_string())?;

        if json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            let verdict = if stats.failed == 0 {
                "ok".green()
            } else {
                "FAILED".red()
            };
            println!(
                "{}: {} directives, {} passed, {} failed, {} skipped ... {verdict}",
                file.display(),
                stats.directives,
                stats.passed,
                stats.failed,
                stats.skipped,
            );
        }
        total_failed += stats.failed;
    }
    if total_failed > 0 {
        bail!("{total_failed} assertion(s) failed");
    }
    Ok(())
}

fn run_symbolic(file: &Path, entry: &str, config: &ExecConfig) -> Result<()> {
    let bytes = load_module_bytes(file)?;
    let (module, index) = prepare_module(&bytes).map_err(|e| anyhow!("{e}"))?;

    let mut explorer = Explorer::new(&module, &index, config.clone(), FoldSolver::new());
    let paths = explorer.explore(entry).map_err(|e| anyhow!("{e}"))?;

    println!(
        "{} terminal path(s) for {}:",
        paths.len().to_string().bold(),
        entry.bold()
    );
    for (i, path) in paths.iter().enumerate() {
        println!("path {i}:");
        if path.condition.is_empty() {
            println!("  condition: (true)");
        } else {
            println!("  condition:");
            for conjunct in &path.condition {
                println!("    {conjunct}");
            }
        }
        match &path.outcome {
            PathOutcome::Return(values) => {
                if values.is_empty() {
                    println!("  {}", "returns".green());
                } else {
                    for value in values {
                        println!("  {} {value}", "returns".green());
                    }
                }
            }
            PathOutcome::Trap(err) => println!("  {} {}", "traps:".red(), err.message),
            PathOutcome::Error(err) => println!("  {} {}", "fails:".yellow(), err.message),
        }
    }
    Ok(())
}

fn report_stats(engine: &Engine<ConcreteEval>) {
    log::info!(
        "executed {} instruction(s), {} call(s), peak depth {}",
        engine.stats.instructions,
        engine.stats.calls,
        engine.stats.peak_depth,
    );
}
