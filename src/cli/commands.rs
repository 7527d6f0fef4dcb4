use crate::api::{run_api_server, ApiConfig};
use crate::config::ServiceConfig;
use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::{
    filled_output_path, CellOutcome, FillReport, GridSerializer, GridWriter, SheetSelector,
    WORKBOOK_EXTENSIONS,
};
use crate::pipeline::Pipeline;
use crate::scan::Collaborators;
use crate::types::{AddressValueMap, DocumentInput};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// `--data` argument: inline JSON, or `@path` to read it from a file
fn load_data_argument(data: &str) -> SheetfillResult<AddressValueMap> {
    match data.strip_prefix('@') {
        Some(path) => {
            let raw = fs::read_to_string(path)?;
            AddressValueMap::parse_json(&raw)
        }
        None => AddressValueMap::parse_json(data),
    }
}

fn ensure_workbook(path: &Path) -> SheetfillResult<()> {
    let input = DocumentInput::ExistingPath(path.to_path_buf());
    match input.extension() {
        Some(ext) if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(SheetfillError::UnsupportedExtension(format!(
            "'{}' is not supported; expected one of {}",
            path.display(),
            WORKBOOK_EXTENSIONS.join(", ")
        ))),
    }
}

fn write_or_print(text: &str, output: Option<&Path>) -> SheetfillResult<()> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            println!("{}", "✅ Markdown written".bold().green());
            println!("   Output: {}\n", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn print_report(report: &FillReport, verbose: bool) {
    println!(
        "   Cells written: {}",
        report.written().to_string().bold().green()
    );

    if verbose {
        for (address, outcome) in &report.outcomes {
            if let CellOutcome::Redirected { target, range } = outcome {
                println!(
                    "   {} → {} (merged range {})",
                    address.cyan(),
                    target.to_string().cyan(),
                    range
                );
            }
        }
    }

    let skipped = report.skipped();
    if !skipped.is_empty() {
        println!(
            "{}",
            format!("⚠️  Skipped {} entries:", skipped.len()).yellow()
        );
        for (address, reason) in skipped {
            println!("   {}: {}", address.yellow(), reason);
        }
    }
}

/// Execute the to-markdown command
pub fn to_markdown(file: PathBuf, output: Option<PathBuf>) -> SheetfillResult<()> {
    ensure_workbook(&file)?;
    let markdown = GridSerializer::new(&file).serialize()?;
    write_or_print(&markdown, output.as_deref())
}

/// Execute the fill command
pub fn fill(
    template: PathBuf,
    data: String,
    output: Option<PathBuf>,
    sheet: Option<String>,
    verbose: bool,
) -> SheetfillResult<()> {
    println!("{}", "📄 Sheetfill - Filling template".bold().green());
    println!("   Template: {}", template.display());

    ensure_workbook(&template)?;
    let values = load_data_argument(&data)?;
    let output = output.unwrap_or_else(|| filled_output_path(&template));
    let selector = match sheet {
        Some(name) => {
            println!("   Sheet: {}", name.bright_blue().bold());
            SheetSelector::Named(name)
        }
        None => SheetSelector::Primary,
    };
    println!("   Entries: {}\n", values.len());

    let report = GridWriter::new(&template)
        .with_sheet(selector)
        .fill(&values, &output)?;

    println!("{}", "✅ Template filled".bold().green());
    print_report(&report, verbose);
    println!("   Output: {}\n", output.display());
    Ok(())
}

/// Execute the scan command
///
/// Without a template the scan is transcribed to markdown; with one the
/// scanned values are mapped onto it and the filled workbook is saved.
pub fn scan(
    document: PathBuf,
    template: Option<PathBuf>,
    output: Option<PathBuf>,
    config: ServiceConfig,
    verbose: bool,
) -> SheetfillResult<()> {
    println!("{}", "📄 Sheetfill - Reading scan".bold().green());
    println!("   Document: {}", document.display());
    if let Some(t) = &template {
        println!("   Template: {}", t.display());
    }
    println!();

    let runtime = tokio::runtime::Runtime::new()?;
    let pipeline = Pipeline::new(
        format!("cli-{}", Uuid::new_v4()),
        config.temp_root(),
        Collaborators::from_config(&config),
    );
    let scan = DocumentInput::ExistingPath(document);

    match template {
        None => {
            let markdown = runtime.block_on(pipeline.scan_to_markdown(scan))?;
            write_or_print(&markdown, output.as_deref())
        }
        Some(template) => {
            let output = output.unwrap_or_else(|| filled_output_path(&template));
            let filled = runtime.block_on(
                pipeline.fill_with_scan(DocumentInput::ExistingPath(template), scan),
            )?;

            println!("{}", "✅ Template filled from scan".bold().green());
            if let Some(mapping) = &filled.mapping {
                println!("   Values mapped: {}", mapping.len());
                if verbose {
                    for (address, value) in mapping.iter() {
                        println!("   {} = {}", address.cyan(), value);
                    }
                }
            }
            print_report(&filled.report, verbose);

            let saved = filled.persist_to(&output)?;
            println!("   Output: {}\n", saved.display());
            Ok(())
        }
    }
}

/// Execute the serve command
pub fn serve(host: String, port: u16, service: ServiceConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_api_server(ApiConfig {
        host,
        port,
        service,
    }))
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
