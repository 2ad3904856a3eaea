///
/// sqlo CLI - Run SQL against SQLite through the sqlo object layer
///
/// Commands:
/// - sqlo query [--db NAME] [--config FILE] SQL [--param JSON]... [--named JSON]
/// - sqlo options [NAME...]
/// - sqlo version
///
/// Rows are printed one JSON object per line. Logs go to stderr; `-v` raises
/// the level and `RUST_LOG` overrides it.
///

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value as Json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sqlo_sqlite3::{compile_options, compile_options_used, version, Database, OpenConfig, Result};

#[derive(Parser)]
#[command(name = "sqlo")]
#[command(author, version, about = "SQLite through the sqlo object layer", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare and run one statement, printing each row as JSON
    Query {
        /// The SQL to run; only the first statement is executed
        sql: String,

        /// Database name (defaults to the config name, then :memory:)
        #[arg(long)]
        db: Option<String>,

        /// TOML connection config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Positional parameter as JSON; plain text is bound as a string
        #[arg(long = "param")]
        params: Vec<String>,

        /// Named parameters as a JSON object, e.g. '{":id": 1}'
        #[arg(long)]
        named: Option<String>,
    },

    /// Print compile options, or whether each NAME is compiled in
    Options {
        names: Vec<String>,
    },

    /// Print engine and API versions
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Query {
            sql,
            db,
            config,
            params,
            named,
        } => run_query(&sql, db, config, &params, named.as_deref()),
        Commands::Options { names } => print_options(&names),
        Commands::Version => print_json(&serde_json::to_value(version()).unwrap_or(Json::Null)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
}

fn run_query(
    sql: &str,
    db: Option<String>,
    config: Option<PathBuf>,
    params: &[String],
    named: Option<&str>,
) -> Result<()> {
    let mut open = match config {
        Some(path) => OpenConfig::from_path(&path)?,
        None => OpenConfig::default(),
    };
    if db.is_some() {
        open.name = db;
    }
    let database = Database::from_config(&open)?;
    let stmt = database.prepare(sql)?;

    for (i, param) in params.iter().enumerate() {
        stmt.bind_json_at(i + 1, &parse_param(param))?;
    }
    if let Some(named) = named {
        let named = serde_json::from_str::<Json>(named).map_err(|e| {
            sqlo_sqlite3::Error::InvalidArguments(format!("--named is not valid JSON: {}", e))
        })?;
        if !named.is_object() {
            return Err(sqlo_sqlite3::Error::InvalidArguments(
                "--named must be a JSON object".to_string(),
            ));
        }
        stmt.bind_json(&named)?;
    }

    let columns = stmt.column_names()?;
    let mut rows = 0usize;
    while stmt.step()? {
        let mut row = Map::new();
        for (name, value) in columns.iter().zip(stmt.row()?) {
            row.insert(name.clone(), serde_json::to_value(value).unwrap_or(Json::Null));
        }
        print_json(&Json::Object(row))?;
        rows += 1;
    }
    debug!(rows, changes = database.changes()?, "query finished");

    stmt.finalize();
    database.close()
}

fn print_options(names: &[String]) -> Result<()> {
    let report = if names.is_empty() {
        serde_json::to_value(compile_options())
    } else {
        serde_json::to_value(compile_options_used(names))
    };
    print_json(&report.unwrap_or(Json::Null))
}

fn print_json(value: &Json) -> Result<()> {
    println!("{}", value);
    Ok(())
}

/// Parses a `--param` value as JSON, treating anything that is not valid
/// JSON as a plain string.
fn parse_param(raw: &str) -> Json {
    serde_json::from_str(raw).unwrap_or_else(|_| Json::String(raw.to_string()))
}
