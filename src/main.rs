use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};

use basalt::config::{AnalyzerConfig, PassId};
use basalt::{analyze_path, render_output, OutputFormat};

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "basalt",
    version = env!("CARGO_PKG_VERSION"),
    about = "Whole-program static analysis for class-based bytecode",
    long_about = None
)]
struct Cli {
    /// Verbose logging (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run analysis passes on a program document.
    Analyze(AnalyzeArgs),
    /// List all available passes.
    ListPasses,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to a .program.json document.
    program: PathBuf,

    /// Comma-separated pass ids (default: every pass except taint).
    #[arg(long)]
    passes: Option<String>,

    /// Output format.
    #[arg(long, default_value = "human")]
    format: FormatArg,

    /// Points-to result consumed by inter-constprop
    /// (ci, 1-call, 2-call, 1-obj, 2-obj).
    #[arg(long)]
    pta: Option<String>,

    /// Context selector for the context-sensitive passes.
    #[arg(long)]
    cs: Option<String>,

    /// TOML document of taint sources, sinks and transfers.
    #[arg(long)]
    taint_config: Option<PathBuf>,
}

#[derive(Clone, clap::ValueEnum)]
enum FormatArg {
    Human,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = TermLogger::init(
        level,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    let result = match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::ListPasses => run_list_passes(),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let mut config = AnalyzerConfig::default();
    if let Some(passes) = &args.passes {
        config.passes = AnalyzerConfig::parse_pass_list(passes)?;
    }
    if let Some(pta) = &args.pta {
        config.set_option("pta", pta);
    }
    if let Some(cs) = &args.cs {
        config.set_option("cs", cs);
    }
    if let Some(path) = &args.taint_config {
        config.set_option("taint-config", &path.display().to_string());
        if !config.wants(PassId::Taint) {
            config.passes.push(PassId::Taint);
        }
    }

    let result = analyze_path(&args.program, &config).context("Analysis failed")?;
    let output = render_output(&result, args.format.into()).context("Render failed")?;
    print!("{output}");
    Ok(0)
}

fn run_list_passes() -> Result<i32> {
    println!("{:<18} Description", "ID");
    println!("{}", "-".repeat(60));
    for pass in PassId::ALL {
        println!("{:<18} {}", pass.id(), pass.describe());
    }
    Ok(0)
}
