use anyhow::{Context, Result};
use clap::Parser;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::{fs, path::PathBuf};

/// Validate normalized course records against the course v1 schema.
#[derive(Parser, Debug)]
#[command(name = "validate-course", version, about = "Validate course record JSON against schema")]
struct Cli {
    /// Path to a JSON file holding one record or an array of records
    path: PathBuf,

    /// Optional path to a schema file (defaults to schemas/course.v1.json)
    #[arg(long)]
    schema: Option<PathBuf>,
}

fn load_json(path: &PathBuf) -> Result<Value> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
    Ok(json)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let schema_path = args
        .schema
        .unwrap_or_else(|| PathBuf::from("schemas/course.v1.json"));

    let schema_json = load_json(&schema_path)?;
    let instance = load_json(&args.path)?;

    // jsonschema 0.17 borrows the schema for the validator's lifetime; leak it for the CLI run
    let schema_static: &'static Value = Box::leak(Box::new(schema_json));

    let compiled = JSONSchema::options()
        .compile(schema_static)
        .map_err(|e| anyhow::anyhow!("Failed to compile JSON Schema: {e}"))?;

    let records: Vec<&Value> = match &instance {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut invalid = 0usize;
    for (i, record) in records.iter().enumerate() {
        if let Err(errors) = compiled.validate(record) {
            invalid += 1;
            let link = record.get("link").and_then(Value::as_str).unwrap_or("<unknown>");
            eprintln!("invalid record {i} ({link}):");
            for error in errors {
                eprintln!("- {} at {}", error, error.instance_path);
            }
        }
    }

    if invalid == 0 {
        println!("valid ({} records)", records.len());
        Ok(())
    } else {
        eprintln!("{invalid} of {} records invalid", records.len());
        std::process::exit(1)
    }
}
