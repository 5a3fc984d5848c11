//! fims-query CLI - Compile entity query expressions to SQL
//!
//! Usage:
//!   fims-query compile --project <schema.json> --entity <alias> --query <expr.json>
//!   fims-query entities --project <schema.json>
//!
//! Examples:
//!   fims-query compile -p demos/project.json -e Sample -q demos/query.json --limit 50
//!   fims-query compile -p demos/project.json -e Event -q demos/query.json --output json
//!   fims-query entities -p demos/project.json

use clap::{Parser, Subcommand, ValueEnum};
use fims_query::compile::{compile_documents, CompileError, CompileOptions};
use fims_query::config::Settings;
use fims_query::model::{Entity, ProjectConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fims-query")]
#[command(about = "Compile entity query expressions into parameterized PostgreSQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query expression to SQL
    Compile {
        /// Project schema (JSON); defaults to `[project] path` from the settings file
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Concept alias of the entity being queried
        #[arg(short, long)]
        entity: String,

        /// Expression tree (JSON)
        #[arg(short, long)]
        query: PathBuf,

        /// Zero-based page number
        #[arg(long)]
        page: Option<u64>,

        /// Page size
        #[arg(long)]
        limit: Option<u64>,

        /// Only return rows from public expeditions
        #[arg(long)]
        public_only: bool,

        /// Network whose schema holds the entity tables
        #[arg(long)]
        network_id: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// List the entities of a project schema
    Entities {
        /// Project schema (JSON); defaults to `[project] path` from the settings file
        #[arg(short, long)]
        project: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL and parameters as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.logging.level.as_str()),
    )
    .init();

    match cli.command {
        Commands::Compile {
            project,
            entity,
            query,
            page,
            limit,
            public_only,
            network_id,
            output,
        } => {
            let mut options = CompileOptions::from_settings(&settings);
            if let Some(page) = page {
                options = options.with_page(page);
            }
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }
            if public_only {
                options = options.only_public(true);
            }
            if let Some(network_id) = network_id {
                options = options.with_network_id(network_id);
            }
            cmd_compile(&settings, project, &entity, query, &options, output)
        }
        Commands::Entities { project } => cmd_entities(&settings, project),
    }
}

fn cmd_compile(
    settings: &Settings,
    project: Option<PathBuf>,
    entity: &str,
    query: PathBuf,
    options: &CompileOptions,
    output: OutputFormat,
) -> ExitCode {
    let Some(schema) = read_project(settings, project) else {
        return ExitCode::FAILURE;
    };
    let Some(expression) = read_file(&query) else {
        return ExitCode::FAILURE;
    };

    match compile_documents(&schema, entity, &expression, options) {
        Ok(compiled) => {
            match output {
                OutputFormat::Sql => {
                    println!("{}", compiled.sql());
                }
                OutputFormat::Json => match serde_json::to_string_pretty(&compiled) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing query: {}", e);
                        return ExitCode::FAILURE;
                    }
                },
            }
            ExitCode::SUCCESS
        }
        Err(CompileError::Query(e)) => {
            eprintln!("Compilation error [{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_entities(settings: &Settings, project: Option<PathBuf>) -> ExitCode {
    let Some(schema) = read_project(settings, project) else {
        return ExitCode::FAILURE;
    };

    let config = match ProjectConfig::from_json(&schema) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Schema error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Entities:");
    for entity in config.entities().iter().filter(|e| !e.is_child_entity()) {
        print_entity(&config, entity, 1);
    }

    if !config.expedition_metadata_properties().is_empty() {
        println!();
        println!("Expedition metadata:");
        for property in config.expedition_metadata_properties() {
            println!("  - {} ({:?})", property.name, property.data_type);
        }
    }

    ExitCode::SUCCESS
}

fn print_entity(config: &ProjectConfig, entity: &Entity, indent: usize) {
    println!(
        "{}- {} (key: {}, {} attributes)",
        "  ".repeat(indent),
        entity.concept_alias,
        entity.unique_key,
        entity.attributes.len()
    );
    let children = config
        .entities()
        .iter()
        .filter(|e| e.parent_entity.as_deref() == Some(entity.concept_alias.as_str()));
    for child in children {
        print_entity(config, child, indent + 1);
    }
}

fn read_project(settings: &Settings, project: Option<PathBuf>) -> Option<String> {
    let path = match project {
        Some(path) => path,
        None => match settings.project.resolved_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("No project schema given; pass --project or set [project] path");
                return None;
            }
            Err(e) => {
                eprintln!("Error resolving project path: {}", e);
                return None;
            }
        },
    };
    read_file(&path)
}

fn read_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            None
        }
    }
}
