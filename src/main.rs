use clap::{Parser, Subcommand};
use royalbit_sheetfill::api::server::init_tracing;
use royalbit_sheetfill::cli;
use royalbit_sheetfill::config::ServiceConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetfill")]
#[command(about = "Fill spreadsheet templates from JSON or scanned documents.")]
#[command(long_about = "Sheetfill - Spreadsheet template filling

Outlines a workbook's populated cells, writes address → value assignments
into a template (merged cells resolve to their top-left cell), and maps
values read from a scanned document onto a template with OCR plus a
language model.

COMMANDS:
  to-markdown - Outline a workbook's populated cells
  fill        - Fill a template from a JSON object
  scan        - Transcribe a scan, or fill a template from it
  serve       - Run the HTTP API server

EXAMPLES:
  sheetfill to-markdown template.xlsx
  sheetfill fill template.xlsx --data '{\"F4\": \"205274-101\"}'
  sheetfill fill template.xlsx --data @values.json -o filled.xlsx
  sheetfill scan report.pdf --template template.xlsx

Scanning needs AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and GEMINI_API_KEY
(environment or .env file) and poppler's pdftoppm for PDF input.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Outline a workbook's populated cells as address-keyed markdown
    ToMarkdown {
        /// Workbook (.xlsx / .xlsm)
        file: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    #[command(long_about = "Fill a template from a JSON object of cell address → value.

Values keep their JSON type: numbers are written as numbers, strings as
text, booleans as booleans. Writes aimed at any cell of a merged region
land on the region's top-left cell. Invalid addresses are reported and
skipped; the rest of the values are still written.

The output defaults to <template>_filled.xlsx next to the template.")]
    /// Fill a template from a JSON object
    Fill {
        /// Template workbook (.xlsx / .xlsm)
        template: PathBuf,

        /// JSON object, or @path to a JSON file
        #[arg(short, long)]
        data: String,

        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sheet to fill (defaults to the first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Show redirected merged-cell writes
        #[arg(short, long)]
        verbose: bool,
    },

    /// Transcribe a scan to markdown, or fill a template from it
    Scan {
        /// Scanned document (.pdf / .png / .jpg / .jpeg)
        document: PathBuf,

        /// Template to fill with the scanned values
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output path (markdown, or the filled workbook with --template)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show the mapped values
        #[arg(short, long)]
        verbose: bool,

        #[command(flatten)]
        config: ServiceConfig,
    },

    /// Run the HTTP API server
    Serve {
        /// Host address to bind to (use 0.0.0.0 for all interfaces)
        #[arg(short = 'H', long, default_value = "127.0.0.1", env = "SHEETFILL_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "SHEETFILL_PORT")]
        port: u16,

        #[command(flatten)]
        config: ServiceConfig,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::ToMarkdown { file, output } => cli::to_markdown(file, output)?,
        Commands::Fill {
            template,
            data,
            output,
            sheet,
            verbose,
        } => cli::fill(template, data, output, sheet, verbose)?,
        Commands::Scan {
            document,
            template,
            output,
            verbose,
            config,
        } => {
            init_tracing("royalbit_sheetfill=warn");
            cli::scan(document, template, output, config, verbose)?
        }
        Commands::Serve { host, port, config } => cli::serve(host, port, config)?,
    }
    Ok(())
}
