//! Interactive SQL console: reads statements from stdin (or a one-shot `-e`
//! argument), runs each one through an [`Engine`], and prints the result as
//! a table.

use anyhow::{Context, Result};
use clap::Parser;
use common::pretty::{render_record_batch, TableStyleKind};
use common::{Config, RecordBatch};
use database::{Engine, QueryRequest};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "toydb-repl", about = "Interactive SQL console for the toy database")]
struct Args {
    /// Path to the single flat file backing the database.
    path: PathBuf,
    /// Fixed-size page allocation in bytes.
    #[arg(long, default_value_t = 4096)]
    page_size: usize,
    /// Number of pages the buffer pool keeps resident.
    #[arg(long, default_value_t = 32)]
    buffer_pages: usize,
    /// Execute the provided SQL (statements separated by `;`) and exit
    /// instead of starting the interactive console.
    #[arg(short = 'e', long = "execute")]
    execute: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::builder()
        .path(args.path.clone())
        .page_size(args.page_size)
        .buffer_pool_pages(args.buffer_pages)
        .build();
    let mut engine = Engine::open(&config).with_context(|| format!("opening {}", args.path.display()))?;

    if let Some(sql) = args.execute {
        for statement in sql.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                run_one(&mut engine, statement);
            }
        }
    } else {
        repl(&mut engine)?;
    }

    engine.checkpoint().context("checkpointing before exit")?;
    Ok(())
}

fn repl(engine: &mut Engine) -> Result<()> {
    let stdin = io::stdin();
    let mut buffer = String::new();

    print!("toydb> ");
    io::stdout().flush().ok();

    for line in stdin.lock().lines() {
        let line = line.context("reading from stdin")?;
        let trimmed = line.trim();
        if buffer.is_empty() && (trimmed == ".exit" || trimmed == ".quit") {
            break;
        }

        buffer.push_str(&line);
        buffer.push(' ');

        if trimmed.ends_with(';') {
            let statement = buffer.trim().trim_end_matches(';').to_string();
            buffer.clear();
            if !statement.is_empty() {
                run_one(engine, &statement);
            }
            print!("toydb> ");
        } else {
            print!("    -> ");
        }
        io::stdout().flush().ok();
    }

    Ok(())
}

fn run_one(engine: &mut Engine, sql: &str) {
    let result = engine.execute(QueryRequest::new(sql));

    if let Some(error) = &result.error {
        eprintln!("error: {error}");
        return;
    }

    let is_status_message = result.columns.len() == 1 && result.columns[0] == "status";
    if is_status_message {
        if let Some(types::Value::Text(message)) = result.rows.first().map(|r| &r.values[0]) {
            println!("{message}");
            return;
        }
    }

    let batch = RecordBatch { columns: result.columns, rows: result.rows };
    println!("{}", render_record_batch(&batch, TableStyleKind::Modern));
}
