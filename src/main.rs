// Main entry point for the sqlcell CLI
// This provides an interactive shell over the same executor the cell magic uses

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use sqlcell::{logging, EngineConfig, ExecuteOptions, QueryExecutor};
use std::io::{self, Write};
use std::path::PathBuf;

/// sqlcell - run SQL statements against an in-memory store
#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON engine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database used for unqualified table names
    #[arg(short, long)]
    database: Option<String>,

    /// Execute SQL (one or more `;`-separated statements) and exit
    #[arg(short, long)]
    execute: Option<String>,
}

fn main() -> Result<()> {
    logging::init_stderr_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let executor = QueryExecutor::with_config(config)?;

    let mut options = ExecuteOptions::default();
    if let Some(database) = args.database {
        options.database = Some(database);
    }

    // If a command was provided, execute it and exit
    if let Some(sql) = args.execute {
        return execute_sql(&executor, &options, &sql);
    }

    println!("╔════════════════════════════════════════════╗");
    println!("║          sqlcell Interactive Shell         ║");
    println!("╚════════════════════════════════════════════╝");
    println!();
    println!("Type SQL commands or '.help' for help");
    println!("Type '.exit' to quit");
    println!();

    repl(&executor, &mut options)
}

/// REPL (Read-Eval-Print Loop)
fn repl(executor: &QueryExecutor, options: &mut ExecuteOptions) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let database = options
            .database
            .as_deref()
            .unwrap_or(&executor.config().default_database);
        print!("sqlcell:{}> ", database);
        stdout.flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            // EOF
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Special commands (starting with .)
        if let Some(command) = input.strip_prefix('.') {
            let mut parts = command.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("exit" | "quit"), _) => {
                    println!("Goodbye!");
                    break;
                }
                (Some("help"), _) => print_help(),
                (Some("databases"), _) => {
                    for name in executor.list_databases() {
                        println!("{}", name);
                    }
                }
                (Some("tables"), db) => {
                    let db = db.unwrap_or(database).to_string();
                    match executor.list_tables(&db) {
                        Ok(tables) => tables.iter().for_each(|t| println!("{}", t)),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                (Some("use"), Some(db)) => {
                    if executor.list_databases().iter().any(|name| name == db) {
                        options.database = Some(db.to_string());
                    } else {
                        eprintln!("Error: Database '{}' not found", db);
                    }
                }
                _ => {
                    println!("Unknown command: {}", input);
                    println!("Type '.help' for help");
                }
            }
            continue;
        }

        if let Err(e) = execute_sql(executor, options, input) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

/// Execute statements and print each result
fn execute_sql(executor: &QueryExecutor, options: &ExecuteOptions, sql: &str) -> Result<()> {
    for result in executor.execute_sql(sql, options)? {
        println!("{}", result.format());
    }
    Ok(())
}

fn print_help() {
    println!("Special Commands:");
    println!("  .help              Show this help message");
    println!("  .exit, .quit       Exit the shell");
    println!("  .databases         List databases");
    println!("  .tables [db]       List tables of a database");
    println!("  .use <db>          Resolve unqualified table names in <db>");
    println!();
    println!("Supported SQL Commands:");
    println!("  CREATE DATABASE [IF NOT EXISTS] db");
    println!("  DROP DATABASE [IF EXISTS] db");
    println!("  CREATE TABLE [IF NOT EXISTS] db.t (features FLOAT, label INT)");
    println!("  DROP TABLE [IF EXISTS] db.t");
    println!("  INSERT INTO db.t (features, label) VALUES (1.0, 0), (2.0, 1)");
    println!("  SELECT * FROM db.t [WHERE label = 1] [LIMIT 1]");
    println!("  UPDATE db.t SET label = 2 WHERE features = 1.0");
    println!("  DELETE FROM db.t WHERE label = 2");
    println!("  CREATE INDEX ON db.t (label)");
    println!("  SHOW DATABASES");
    println!();
    println!("Notes:");
    println!("  - Keywords and unquoted names are case-insensitive");
    println!("  - String values must be in single quotes");
    println!("  - UPDATE and DELETE require a WHERE clause");
}
