//! Simple pipeline example: validate uploaded KiCad files and print the summary.

use boardcheck::prelude::*;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("Usage: cargo run --example simple_pipeline <file.kicad_pro> [more files...]");
        std::process::exit(1);
    }

    let files = paths
        .iter()
        .map(|p| UploadedFile::from_path(Path::new(p)))
        .collect::<Result<Vec<_>, _>>()?;

    let config = boardcheck::load_config(None)?;
    let pipeline = Pipeline::new(config);

    let result = match pipeline.run(None, &files).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Validation failed ({}): {}", e.reason(), e.user_message());
            std::process::exit(1);
        }
    };

    println!("Validation {}: {}", result.validation_id, result.summary.status);
    println!("Analysis engine available: {}", result.analysis.mcp_available);
    println!();

    if !result.summary.notes.is_empty() {
        println!("Notes:");
        for note in &result.summary.notes {
            println!("  - {}", note);
        }
        println!();
    }

    println!("Firmware plan:");
    for phase in &result.firmware_plan.phases {
        println!("  {} ({} tasks)", phase.phase_name, phase.tasks.len());
    }
    println!();

    println!("Artifacts in {}:", pipeline.store().dir().display());
    for name in [
        &result.files.report,
        &result.files.firmware_plan,
        &result.files.components,
        &result.files.summary,
    ] {
        println!("  {}", name);
    }

    Ok(())
}
