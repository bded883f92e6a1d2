//! BoardCheck CLI - KiCad design validation and firmware planning from the command line.

use boardcheck::analysis::{AnalysisOp, AnalysisTarget};
use boardcheck::{
    load_config, to_response, BoardCheckError, Pipeline, PipelineResult, PlanningResult,
    UploadedFile,
};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;

const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;

#[derive(Parser)]
#[command(name = "boardcheck")]
#[command(about = "KiCad design validation and firmware bring-up planning", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a set of uploaded KiCad files
    Validate {
        /// Project, board, schematic and auxiliary files
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Validation id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Artifact output directory
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Use the planning agent instead of the analysis engine
        #[arg(long)]
        planner: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List analysis operations and the engine tools they call
    Operations,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON response
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Validate {
            files,
            id,
            out,
            config,
            planner,
            format,
        } => handle_validate(&files, id, out, config.as_deref(), planner, &format),
        Commands::Operations => {
            handle_operations();
            0
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn handle_validate(
    paths: &[PathBuf],
    id: Option<String>,
    out: Option<PathBuf>,
    config_path: Option<&Path>,
    planner: bool,
    format: &OutputFormat,
) -> i32 {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => return report_failure(&e, format),
    };
    if let Some(out) = out {
        config.output.dir = out;
    }

    let (files, runtime) = match read_uploads(paths).and_then(|files| {
        let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
        Ok((files, runtime))
    }) {
        Ok(ready) => ready,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_FAILURE;
        }
    };

    let pipeline = Pipeline::new(config);
    if planner {
        let result = runtime.block_on(pipeline.run_planning(id.as_deref(), &files));
        match format {
            OutputFormat::Json => output_json(&to_response(&result)),
            OutputFormat::Human => {
                if let Ok(result) = &result {
                    output_planning_human(result, &pipeline);
                }
            }
        }
        exit_code_for(result.as_ref().err(), format)
    } else {
        let result = runtime.block_on(pipeline.run(id.as_deref(), &files));
        match format {
            OutputFormat::Json => output_json(&to_response(&result)),
            OutputFormat::Human => {
                if let Ok(result) = &result {
                    output_human(result, &pipeline);
                }
            }
        }
        exit_code_for(result.as_ref().err(), format)
    }
}

fn read_uploads(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadedFile>> {
    paths
        .iter()
        .map(|path| {
            UploadedFile::from_path(path)
                .with_context(|| format!("cannot read {}", path.display()))
        })
        .collect()
}

fn exit_code_for(error: Option<&BoardCheckError>, format: &OutputFormat) -> i32 {
    match error {
        None => 0,
        Some(e) => {
            // JSON output already carries the failure response.
            if matches!(format, OutputFormat::Human) {
                eprintln!("Error: {} ({})", e.user_message(), e.reason());
            }
            exit_code(e)
        }
    }
}

fn report_failure(error: &BoardCheckError, format: &OutputFormat) -> i32 {
    match format {
        OutputFormat::Json => output_json(&error.to_response()),
        OutputFormat::Human => eprintln!("Error: {} ({})", error.user_message(), error.reason()),
    }
    exit_code(error)
}

fn exit_code(error: &BoardCheckError) -> i32 {
    match error {
        BoardCheckError::Config(_) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

fn output_json(response: &Value) {
    let text = serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string());
    println!("{}", text);
}

fn output_human(result: &PipelineResult, pipeline: &Pipeline) {
    let summary = &result.summary;
    println!("\nValidation: {}", result.validation_id);
    println!("{}", "─".repeat(60));
    println!("  Status:          {}", summary.status.as_str().to_uppercase());
    println!(
        "  Analysis engine: {}",
        if result.analysis.mcp_available {
            "available"
        } else {
            "unavailable"
        }
    );

    let count = |c: Option<u64>| c.map(|c| c.to_string()).unwrap_or_else(|| "n/a".to_string());
    println!("\n  Counts:");
    println!("    Components:       {}", count(summary.counts.components));
    println!("    Nets:             {}", count(summary.counts.nets));
    println!("    DRC violations:   {}", count(summary.counts.drc_violations));
    println!("    Boundary issues:  {}", count(summary.counts.boundary_issues));
    println!("    Circuit patterns: {}", count(summary.counts.patterns));

    print_notes(&summary.notes);

    println!("\n  Firmware plan:");
    for phase in &result.firmware_plan.phases {
        println!("    {} ({} tasks)", phase.phase_name, phase.tasks.len());
    }

    print_artifacts(
        pipeline,
        &[
            &result.files.report,
            &result.files.firmware_plan,
            &result.files.components,
            &result.files.summary,
        ],
    );
}

fn output_planning_human(result: &PlanningResult, pipeline: &Pipeline) {
    println!("\nPlanning run: {}", result.validation_id);
    println!("{}", "─".repeat(60));
    println!(
        "  Files: {} ({} bytes)",
        result.summary.counts.files, result.summary.counts.bytes
    );
    println!("  {}", result.firmware_plan.overview);

    print_notes(&result.summary.notes);

    println!("\n  Firmware plan:");
    for phase in &result.firmware_plan.phases {
        println!("    {} ({} tasks)", phase.phase_name, phase.tasks.len());
    }

    print_artifacts(
        pipeline,
        &[
            &result.files.firmware_plan,
            &result.files.prd,
            &result.files.summary,
        ],
    );
}

fn print_notes(notes: &[String]) {
    if notes.is_empty() {
        return;
    }
    println!("\n  Notes:");
    for note in notes {
        println!("    - {}", note);
    }
}

fn print_artifacts(pipeline: &Pipeline, names: &[&String]) {
    println!("\n  Artifacts:");
    for name in names {
        println!("    {}", pipeline.store().path_of(name).display());
    }
}

fn handle_operations() {
    println!("Analysis operations:\n");
    let project = AnalysisTarget::Project(PathBuf::new());
    let schematic = AnalysisTarget::Schematic(PathBuf::new());

    println!("  {:<18} {:<34} schematic only", "operation", "with project file");
    for op in AnalysisOp::ALL {
        let schematic_tool = if AnalysisOp::SCHEMATIC_SET.contains(&op) {
            op.tool_name(&schematic)
        } else {
            "-"
        };
        println!(
            "  {:<18} {:<34} {}",
            op.key(),
            op.tool_name(&project),
            schematic_tool
        );
    }
}
