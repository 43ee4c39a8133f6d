//! DTO Schema CLI
//!
//! Command-line interface for mapping payloads onto DTO schemas and checking
//! schema declaration sources.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dto_schema::{
    lint, load_payload, FileResult, FileStatus, Flags, SchemaRegistry, Severity,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dto-schema")]
#[command(about = "Map JSON payloads onto declared DTO schemas")]
#[command(version)]
struct Cli {
    /// Log schema builds and property mapping to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a JSON payload onto a schema and print the resulting values
    Map {
        /// Payload file to map
        payload: PathBuf,

        /// Directory (or single file) of .dto schema sources
        #[arg(long)]
        schemas: PathBuf,

        /// Schema identifier to map onto (e.g., app.User)
        #[arg(long)]
        schema: String,

        /// Omit properties missing from the payload instead of failing
        #[arg(long)]
        partial: bool,

        /// Tolerate payload keys that no property consumes
        #[arg(long)]
        ignore_unknown: bool,

        /// Payload and output keys are camelCase instead of snake_case
        #[arg(long)]
        camel_case: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output errors as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// List a schema's properties with their resolved types
    Inspect {
        /// Schema identifier (e.g., app.User)
        schema: String,

        /// Directory (or single file) of .dto schema sources
        #[arg(long)]
        schemas: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lint schema sources (syntax, missing blocks, unresolved parents and types)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Map {
            payload,
            schemas,
            schema,
            partial,
            ignore_unknown,
            camel_case,
            output,
            pretty,
            json,
        } => {
            let mut flags = Flags::NONE;
            if partial {
                flags |= Flags::PARTIAL;
            }
            if ignore_unknown {
                flags |= Flags::IGNORE_UNKNOWN_PROPERTIES;
            }
            if camel_case {
                flags |= Flags::CAMEL_CASE_ARRAY;
            }
            run_map(MapArgs {
                payload,
                schemas,
                schema,
                flags,
                output,
                pretty,
                json_output: json,
            })
        }

        Commands::Inspect {
            schema,
            schemas,
            json,
        } => run_inspect(&schema, &schemas, json),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct MapArgs {
    payload: PathBuf,
    schemas: PathBuf,
    schema: String,
    flags: Flags,
    output: Option<PathBuf>,
    pretty: bool,
    json_output: bool,
}

fn load_registry(schemas: &Path, json_output: bool) -> Result<Arc<SchemaRegistry>, u8> {
    let registry = SchemaRegistry::new();
    registry.load_dir(schemas).map_err(|e| {
        report_error(json_output, &format!("loading schemas: {}", e));
        e.exit_code() as u8
    })?;
    Ok(Arc::new(registry))
}

fn run_map(args: MapArgs) -> Result<(), u8> {
    let MapArgs {
        payload: payload_path,
        schemas,
        schema,
        flags,
        output,
        pretty,
        json_output,
    } = args;

    let registry = load_registry(&schemas, json_output)?;
    let payload = load_payload(&payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    let mapped = registry
        .dto(&schema, &payload, flags)
        .and_then(|dto| dto.to_value())
        .map_err(|e| {
            report_error(json_output, &e.to_string());
            e.exit_code() as u8
        })?;

    let rendered = if pretty {
        serde_json::to_string_pretty(&mapped)
    } else {
        serde_json::to_string(&mapped)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", rendered);
        }
    }

    Ok(())
}

fn run_inspect(schema_id: &str, schemas: &Path, json_output: bool) -> Result<(), u8> {
    let registry = load_registry(schemas, json_output)?;
    let schema = registry.get_or_build(schema_id).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    if json_output {
        let properties: Vec<_> = schema
            .properties()
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "declared": p.raw_types,
                    "types": p.types.declared_names(),
                    "nullable": p.types.includes_null,
                    "declared_in": p.declared_in,
                })
            })
            .collect();
        let output = json!({
            "schema": schema.id(),
            "ancestors": schema.ancestors(),
            "properties": properties,
        });
        println!("{}", output);
    } else {
        println!("{}", schema.id());
        for ancestor in schema.ancestors() {
            println!("  extends {}", ancestor);
        }
        for property in schema.properties() {
            println!(
                "  {}: {}",
                property.name,
                property.types.declared_names().join("|")
            );
        }
    }

    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

fn print_file_result(file_result: &FileResult, quiet: bool) {
    let (color, marker) = match file_result.status {
        FileStatus::Ok if quiet => return,
        FileStatus::Ok => (GREEN, "ok"),
        FileStatus::Warning => (YELLOW, "warn"),
        FileStatus::Error => (RED, "FAIL"),
    };
    println!("{color}{marker:>4}{RESET} {}", file_result.file.display());

    for diag in &file_result.diagnostics {
        let color = match diag.severity {
            Severity::Error => RED,
            Severity::Warning if quiet => continue,
            Severity::Warning => YELLOW,
        };
        println!(
            "       {color}{}{RESET} {}: {}",
            diag.code, diag.location, diag.message
        );
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        let rendered = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", rendered);
    } else {
        for file_result in &result.results {
            print_file_result(file_result, quiet);
        }

        if passed {
            println!("{GREEN}{} files checked, all passed{RESET}", result.files_checked);
        } else {
            println!(
                "{RED}{} files checked: {} failed, {} errors, {} warnings{RESET}",
                result.files_checked, result.failed, result.errors, result.warnings
            );
        }
    }

    if passed {
        Ok(())
    } else {
        Err(1)
    }
}
