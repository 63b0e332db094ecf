//! Commands that inspect an assembled stack without writing it

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use stack_lib::{assembler::environment, ApplicationAssembler, Assembly, StackSettings};
use tabled::Tabled;

use crate::output::{mask_secret, print_table, print_warning, render_value, OutputFormat};

/// Output holding the generated admin password
const ADMIN_PASSWORD_OUTPUT: &str = "AdminPassword";

/// Row for resources table
#[derive(Tabled, Serialize)]
struct ResourceRow {
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Depends On")]
    depends_on: String,
}

/// Row for environment table
#[derive(Tabled, Serialize)]
struct EnvironmentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Row for outputs table
#[derive(Tabled, Serialize)]
struct OutputRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn assemble(settings: StackSettings) -> Result<Assembly> {
    ApplicationAssembler::new(settings)
        .assemble()
        .context("Stack assembly failed")
}

/// List declared resources, optionally filtered by type
pub fn list_resources(
    settings: StackSettings,
    resource_type: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let assembly = assemble(settings)?;
    let rows: Vec<ResourceRow> = assembly
        .stack
        .resources()
        .filter(|(_, r)| resource_type.map_or(true, |t| r.resource_type == t))
        .map(|(id, r)| ResourceRow {
            logical_id: id.to_string(),
            resource_type: r.resource_type.clone(),
            depends_on: r.depends_on.join(", "),
        })
        .collect();

    if let OutputFormat::Table = format {
        println!(
            "{} {} resources",
            assembly.stack.name().bold(),
            rows.len().to_string().cyan()
        );
    }
    print_table(&rows, format);
    Ok(())
}

/// Show the environment injected into every Airflow container
pub fn show_environment(settings: StackSettings, format: OutputFormat) -> Result<()> {
    let assembly = assemble(settings)?;
    let rows: Vec<EnvironmentRow> = assembly
        .environment
        .iter()
        .map(|(name, value)| {
            let rendered = render_value(value);
            EnvironmentRow {
                name: name.clone(),
                value: if name == environment::ADMIN_PASSWORD {
                    mask_secret(rendered, format)
                } else {
                    rendered
                },
            }
        })
        .collect();

    print_table(&rows, format);
    Ok(())
}

/// List stack outputs
pub fn show_outputs(settings: StackSettings, format: OutputFormat) -> Result<()> {
    let assembly = assemble(settings)?;
    let rows: Vec<OutputRow> = assembly
        .stack
        .outputs()
        .map(|(logical_id, output)| {
            let rendered = render_value(&output.value);
            OutputRow {
                name: output.name.clone(),
                logical_id: logical_id.to_string(),
                value: if output.name == ADMIN_PASSWORD_OUTPUT {
                    mask_secret(rendered, format)
                } else {
                    rendered
                },
                description: output.description.clone().unwrap_or_default(),
            }
        })
        .collect();

    print_table(&rows, format);
    if let OutputFormat::Table = format {
        if rows.iter().any(|r| r.name == ADMIN_PASSWORD_OUTPUT) {
            print_warning("AdminPassword is exported as a plaintext stack output");
        }
    }
    Ok(())
}
