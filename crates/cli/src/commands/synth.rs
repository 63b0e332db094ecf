//! Stack synthesis command

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use stack_lib::{
    ApplicationAssembler, AssemblyDirectory, StackSettings, SynthMetrics,
};
use std::path::Path;
use tabled::Tabled;

use crate::output::{format_timestamp, print_info, print_success, print_table, OutputFormat};

/// Row for written files table
#[derive(Tabled, Serialize)]
struct FileRow {
    #[tabled(rename = "File")]
    file: String,
}

#[derive(Serialize)]
struct SynthSummary {
    stack: String,
    environment: String,
    directory: String,
    resources: usize,
    outputs: usize,
    assets: usize,
    files: Vec<String>,
    created_at: String,
}

async fn write_metrics(metrics: &SynthMetrics, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        let text = metrics.encode().context("Failed to encode metrics")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }
    Ok(())
}

/// Assemble the stack and hand it to the assembly directory engine
pub async fn synthesize(
    settings: StackSettings,
    out: &Path,
    to_stdout: bool,
    metrics_file: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let metrics = SynthMetrics::new().context("Failed to register synthesis metrics")?;
    let assembler = ApplicationAssembler::new(settings).with_metrics(metrics.clone());

    if to_stdout {
        let assembly = assembler.assemble().context("Stack assembly failed")?;
        write_metrics(&metrics, metrics_file).await?;
        let template = serde_json::to_string_pretty(&assembly.stack.synthesize())?;
        println!("{}", template);
        return Ok(());
    }

    let engine = AssemblyDirectory::new(out);
    let (assembly, receipt) = assembler
        .deploy(&engine)
        .await
        .context("Stack synthesis failed")?;
    write_metrics(&metrics, metrics_file).await?;
    let stack = &assembly.stack;

    let files: Vec<String> = receipt
        .files
        .iter()
        .map(|f| f.display().to_string())
        .collect();

    match format {
        OutputFormat::Json => {
            let summary = SynthSummary {
                stack: receipt.stack_name.clone(),
                environment: receipt.environment.clone(),
                directory: receipt.location.clone(),
                resources: stack.len(),
                outputs: stack.outputs().count(),
                assets: stack.assets().count(),
                files,
                created_at: format_timestamp(receipt.created_at),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Synthesized {} into {}",
                receipt.stack_name.cyan(),
                receipt.location
            ));
            println!("Environment:            {}", receipt.environment);
            println!("Resources:              {}", stack.len());
            println!("Outputs:                {}", stack.outputs().count());
            println!("Image assets:           {}", stack.assets().count());
            println!();

            let rows: Vec<FileRow> = files.into_iter().map(|file| FileRow { file }).collect();
            print_table(&rows, format);

            if let Some(path) = metrics_file {
                print_info(&format!("Metrics written to {}", path.display()));
            }
        }
    }

    Ok(())
}
