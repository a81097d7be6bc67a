//! Tabflow CLI - configuration-driven ETL
//!
//! ```bash
//! tabflow run etl.json              # Extract, transform, restructure, load
//! tabflow query etl.json            # Print the SELECT for a table source
//! tabflow project etl.json          # Extract + project only, print records
//! tabflow example-config            # Show an example pipeline configuration
//! tabflow operations                # Show available transformation steps
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tabflow::{build_query, extract, operations_description, run_etl, to_records, PipelineConfig, LOG_BROADCASTER};

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Project, transform and restructure tabular data from a JSON pipeline config", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full ETL pipeline
    Run {
        /// Pipeline configuration file
        config: PathBuf,

        /// Do not echo progress to stderr
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the SQL generated for the extract section
    Query {
        /// Pipeline configuration file
        config: PathBuf,
    },

    /// Extract and project only, printing the records as JSON
    Project {
        /// Pipeline configuration file
        config: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show example pipeline configuration
    ExampleConfig,

    /// Show available transformation steps
    Operations,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, quiet } => cmd_run(&config, quiet),
        Commands::Query { config } => cmd_query(&config),
        Commands::Project { config, output } => cmd_project(&config, output.as_deref()),
        Commands::ExampleConfig => cmd_example_config(),
        Commands::Operations => cmd_operations(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(config_path: &Path, quiet: bool) -> Result<(), Box<dyn std::error::Error>> {
    LOG_BROADCASTER.set_echo(!quiet);
    let config = PipelineConfig::from_file(config_path)?;

    let report = run_etl(&config)?;

    eprintln!(
        "\n✨ {} rows x {} columns -> {}",
        report.rows,
        report.columns,
        report.destination.display()
    );
    Ok(())
}

fn cmd_query(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_file(config_path)?;
    println!("{}", build_query(&config.extract)?);
    Ok(())
}

fn cmd_project(config_path: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_file(config_path)?;

    let dataset = extract(&config.extract)?;
    let records = to_records(&dataset)?;

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)
}

fn cmd_example_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", PipelineConfig::example().to_json()?);
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
