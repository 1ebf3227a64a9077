use anyhow::{Context, Result};
use clap::Parser;
use criteria_compiler::{ConfigError, CriteriaDocument, CriteriaQueryCompiler, FieldMappingConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "criteria-compiler")]
#[command(about = "Compile JSON criteria documents into search queries")]
#[command(version)]
struct Args {
    /// Field mapping configuration
    #[arg(long, short, default_value = "field_mapping.json")]
    config: PathBuf,

    /// Pretty-print the compiled query
    #[arg(long)]
    pretty: bool,

    /// Criteria document to compile; opens a prompt when omitted
    document: Option<PathBuf>,
}

/// Loads the field mapping, falling back to an empty mapping when the file
/// is missing or unreadable.
fn load_mapping(path: &Path) -> FieldMappingConfig {
    match FieldMappingConfig::from_json_file(path) {
        Ok(config) => {
            tracing::info!(
                fields = config.fields.len(),
                nested = config.nested.len(),
                "Loaded field mapping from {}",
                path.display()
            );
            config
        }
        Err(ConfigError::NotFound(_)) => {
            tracing::debug!("No field mapping at {}, using defaults", path.display());
            FieldMappingConfig::default()
        }
        Err(e) => {
            tracing::warn!("{}, using defaults", e);
            FieldMappingConfig::default()
        }
    }
}

fn compile_document(input: &str, mapping: &FieldMappingConfig, pretty: bool) -> Result<String> {
    let chain = CriteriaDocument::from_json(input)?.into_chain(mapping)?;
    let query = CriteriaQueryCompiler::new()
        .compile(&chain)
        .map(|query| query.to_json())
        .unwrap_or(serde_json::Value::Null);

    let rendered = if pretty {
        serde_json::to_string_pretty(&query)?
    } else {
        serde_json::to_string(&query)?
    };
    Ok(rendered)
}

fn run_prompt(mapping: &FieldMappingConfig, pretty: bool) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to start prompt")?;

    loop {
        match editor.readline("criteria> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                match compile_document(line, mapping, pretty) {
                    Ok(output) => println!("{}", output),
                    Err(e) => eprintln!("error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "criteria_compiler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mapping = load_mapping(&args.config);

    match args.document {
        Some(path) => {
            let input = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let output = compile_document(&input, &mapping, args.pretty)
                .with_context(|| format!("Failed to compile {}", path.display()))?;
            println!("{}", output);
        }
        None => run_prompt(&mapping, args.pretty)?,
    }

    Ok(())
}
