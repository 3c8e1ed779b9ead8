//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::cli::output::{
    OutputFormat, format_count, format_drop, format_import, format_resolve,
    format_search_result, format_status, format_tables,
};
use crate::cli::parser::{Cli, Commands};
use crate::config::{EngineConfig, SourceConfig};
use crate::error::{CommandError, IoError, Result, SourceError};
use crate::io::{read_input, split_chunks};
use crate::source::{SqliteSource, TableSource, parse_records};
use crate::stream::{Interceptor, intercept};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Chunks buffered between the replay task and the interceptor.
const REPLAY_BUFFER: usize = 16;

/// Options for the `resolve` command.
#[derive(Debug, Clone, Copy)]
struct ResolveOptions {
    chunk_size: usize,
    delay_ms: u64,
    concurrent: bool,
    max_pending: usize,
}

/// Executes the CLI command.
///
/// `resolve` writes its text output to `out` as it is produced; every
/// other command returns its output.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub async fn execute(cli: &Cli, out: &mut dyn Write) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();
    let config = cli.source_config();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force),
        Commands::Status => cmd_status(&db_path, config, format),
        Commands::Import { table, file } => cmd_import(&db_path, config, table, file, format),
        Commands::Drop { table, yes } => cmd_drop(&db_path, config, table, *yes, format),
        Commands::Tables => {
            let source = open_source(&db_path, config)?;
            let tables = source.list_tables().await?;
            Ok(format_tables(&tables, format))
        }
        Commands::Search { table, limit } => {
            let source = open_source(&db_path, config)?;
            let result = source.search_table(table, *limit).await?;
            Ok(format_search_result(&result, format))
        }
        Commands::Query { table, term, limit } => {
            let source = open_source(&db_path, config)?;
            let result = source.search_table_by_term(table, term, *limit).await?;
            Ok(format_search_result(&result, format))
        }
        Commands::Count { table } => {
            let source = open_source(&db_path, config)?;
            let count = source.count_table(table).await?;
            Ok(format_count(table, count, format))
        }
        Commands::Resolve {
            file,
            chunk_size,
            delay_ms,
            concurrent,
            max_pending,
        } => {
            let options = ResolveOptions {
                chunk_size: *chunk_size,
                delay_ms: *delay_ms,
                concurrent: *concurrent,
                max_pending: *max_pending,
            };
            cmd_resolve(&db_path, config, file.as_deref(), options, format, out).await
        }
    }
}

/// Opens the record store and ensures it's initialized.
fn open_source(db_path: &Path, config: SourceConfig) -> Result<SqliteSource> {
    config.validate()?;

    if !db_path.exists() {
        return Err(SourceError::NotInitialized.into());
    }

    let source = SqliteSource::open(db_path, config)?;
    if !source.is_initialized()? {
        return Err(SourceError::NotInitialized.into());
    }

    Ok(source)
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &Path, force: bool) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Record store already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing record store: {e}"))
        })?;
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = db_path.as_os_str().to_owned();
            sidecar.push(suffix);
            let _ = std::fs::remove_file(sidecar);
        }
    }

    let source = SqliteSource::open(db_path, SourceConfig::default())?;
    source.init()?;

    Ok(format!(
        "Initialized record store at: {}\n",
        db_path.display()
    ))
}

fn cmd_status(db_path: &Path, config: SourceConfig, format: OutputFormat) -> Result<String> {
    let source = open_source(db_path, config)?;
    let stats = source.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_import(
    db_path: &Path,
    config: SourceConfig,
    table: &str,
    file: &Path,
    format: OutputFormat,
) -> Result<String> {
    let table = table.trim();
    if table.is_empty() {
        return Err(CommandError::InvalidArgument("table name cannot be empty".to_string()).into());
    }

    let source = open_source(db_path, config)?;
    let text = read_input(Some(file))?;
    let records = parse_records(&text)?;
    let ids = source.insert_records(table, &records)?;
    debug!(table, imported = ids.len(), "imported records");

    Ok(format_import(table, &ids, format))
}

fn cmd_drop(
    db_path: &Path,
    config: SourceConfig,
    table: &str,
    yes: bool,
    format: OutputFormat,
) -> Result<String> {
    if !yes {
        return Err(
            CommandError::ExecutionFailed("Use --yes to confirm deletion.".to_string()).into(),
        );
    }

    let source = open_source(db_path, config)?;
    if !source.drop_table(table)? {
        return Err(SourceError::TableNotFound {
            table: table.to_string(),
        }
        .into());
    }
    debug!(table, "dropped table");

    Ok(format_drop(table, format))
}

async fn cmd_resolve(
    db_path: &Path,
    config: SourceConfig,
    file: Option<&Path>,
    options: ResolveOptions,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<String> {
    let engine_config = EngineConfig::new()
        .with_max_pending(options.max_pending)
        .with_concurrent(options.concurrent);
    engine_config.validate()?;

    let source = open_source(db_path, config)?;
    let text = read_input(file)?;
    let chunks: Vec<String> = split_chunks(&text, options.chunk_size)
        .into_iter()
        .map(str::to_string)
        .collect();
    debug!(chunks = chunks.len(), delay_ms = options.delay_ms, "replaying input");

    let (tx, rx) = mpsc::channel(REPLAY_BUFFER);
    let producer = tokio::spawn(replay(chunks, tx, options.delay_ms));

    let mut interceptor = Interceptor::with_config(Arc::new(source), engine_config);
    let mut collected = String::new();
    {
        let output = intercept(ReceiverStream::new(rx), &mut interceptor);
        let mut output = std::pin::pin!(output);
        while let Some(piece) = output.next().await {
            let piece = piece?;
            match format {
                OutputFormat::Text => {
                    if let Err(e) = out.write_all(piece.as_bytes()).and_then(|()| out.flush()) {
                        if e.kind() == io::ErrorKind::BrokenPipe {
                            debug!("stdout closed, stopping");
                            break;
                        }
                        return Err(IoError::WriteFailed {
                            reason: e.to_string(),
                        }
                        .into());
                    }
                }
                OutputFormat::Json => collected.push_str(&piece),
            }
        }
    }

    producer
        .await
        .map_err(|e| CommandError::ExecutionFailed(format!("replay task failed: {e}")))?;

    Ok(format_resolve(&collected, interceptor.stats(), format))
}

/// Feeds chunks into the interceptor's upstream channel, stopping early if
/// the consumer goes away.
async fn replay(
    chunks: Vec<String>,
    tx: mpsc::Sender<std::result::Result<String, Infallible>>,
    delay_ms: u64,
) {
    for chunk in chunks {
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if tx.send(Ok(chunk)).await.is_err() {
            debug!("consumer gone, stopping replay");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn cli(db_path: &Path, command: Commands) -> Cli {
        Cli {
            db_path: Some(db_path.to_path_buf()),
            catalog: None,
            verbose: false,
            format: "text".to_string(),
            command,
        }
    }

    fn run(cli: &Cli) -> (Result<String>, String) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut out = Vec::new();
        let result = runtime.block_on(execute(cli, &mut out));
        (result, String::from_utf8(out).unwrap())
    }

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("store").join("records.db");
        let (result, _) = run(&cli(&db_path, Commands::Init { force: false }));
        assert!(result.unwrap().contains("Initialized record store"));

        let data = dir.path().join("archive.json");
        std::fs::write(
            &data,
            r#"[{"Patient": "Verma", "Treatment": "peel"}, {"Patient": "Quan, Luis"}]"#,
        )
        .unwrap();
        let (result, _) = run(&cli(
            &db_path,
            Commands::Import {
                table: "Master Archive".to_string(),
                file: data,
            },
        ));
        assert_eq!(result.unwrap(), "Imported 2 records into Master Archive\n");
        (dir, db_path)
    }

    #[test]
    fn test_init_twice_requires_force() {
        let (_dir, db_path) = setup();
        let (result, _) = run(&cli(&db_path, Commands::Init { force: false }));
        assert!(result.is_err());
        let (result, _) = run(&cli(&db_path, Commands::Init { force: true }));
        assert!(result.is_ok());
        let (result, _) = run(&cli(&db_path, Commands::Count {
            table: "Master Archive".to_string(),
        }));
        assert_eq!(result.unwrap(), "0\n");
    }

    #[test]
    fn test_uninitialized_store() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("missing.db");
        let (result, _) = run(&cli(&db_path, Commands::Tables));
        assert!(result.unwrap_err().to_string().contains("marksplice init"));
    }

    #[test]
    fn test_query_commands() {
        let (_dir, db_path) = setup();

        let (result, _) = run(&cli(&db_path, Commands::Tables));
        assert_eq!(result.unwrap(), "1. **Master Archive**\n");

        let (result, _) = run(&cli(&db_path, Commands::Count {
            table: "Master Archive".to_string(),
        }));
        assert_eq!(result.unwrap(), "2\n");

        let (result, _) = run(&cli(&db_path, Commands::Query {
            table: "Master Archive".to_string(),
            term: "Luis Quan".to_string(),
            limit: 10,
        }));
        let text = result.unwrap();
        assert!(text.contains("**Patient:** Quan, Luis"));
        assert!(!text.contains("Verma"));

        let (result, _) = run(&cli(&db_path, Commands::Search {
            table: "Snapchat".to_string(),
            limit: 10,
        }));
        assert_eq!(result.unwrap(), "_No records found._\n");
    }

    #[test]
    fn test_resolve_streams_to_writer() {
        let (dir, db_path) = setup();
        let input = dir.path().join("reply.md");
        std::fs::write(&input, "We have {{COUNT:Master Archive}} patients.").unwrap();

        let (result, out) = run(&cli(&db_path, Commands::Resolve {
            file: Some(input),
            chunk_size: 3,
            delay_ms: 0,
            concurrent: false,
            max_pending: 500,
        }));
        assert_eq!(result.unwrap(), "");
        assert_eq!(out, "We have 2 patients.");
    }

    #[test]
    fn test_resolve_json_summary() {
        let (dir, db_path) = setup();
        let input = dir.path().join("reply.md");
        std::fs::write(&input, "{{COUNT:Master Archive}} and {{TABLES}}").unwrap();

        let mut cli = cli(&db_path, Commands::Resolve {
            file: Some(input),
            chunk_size: 5,
            delay_ms: 0,
            concurrent: true,
            max_pending: 500,
        });
        cli.format = "json".to_string();
        let (result, out) = run(&cli);
        let json: serde_json::Value = serde_json::from_str(&result.unwrap()).unwrap();
        assert!(out.is_empty());
        assert_eq!(
            json["output"],
            "2 and \n\n1. **Master Archive**\n\n"
        );
        assert_eq!(json["stats"]["markers"], 2);
        assert_eq!(json["stats"]["failures"], 0);
    }

    #[test]
    fn test_resolve_rejects_tiny_ceiling() {
        let (dir, db_path) = setup();
        let input = dir.path().join("reply.md");
        std::fs::write(&input, "text").unwrap();
        let (result, _) = run(&cli(&db_path, Commands::Resolve {
            file: Some(input),
            chunk_size: 3,
            delay_ms: 0,
            concurrent: false,
            max_pending: 1,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_table() {
        let (_dir, db_path) = setup();
        let drop_cmd = |yes| {
            cli(&db_path, Commands::Drop {
                table: "Master Archive".to_string(),
                yes,
            })
        };

        let (result, _) = run(&drop_cmd(false));
        assert!(result.unwrap_err().to_string().contains("--yes"));

        let (result, _) = run(&drop_cmd(true));
        assert_eq!(result.unwrap(), "Dropped table: Master Archive\n");

        let (result, _) = run(&cli(&db_path, Commands::Tables));
        assert_eq!(result.unwrap(), "No tables found.\n");

        let (result, _) = run(&drop_cmd(true));
        assert!(matches!(
            result,
            Err(Error::Source(SourceError::TableNotFound { table })) if table == "Master Archive"
        ));
    }

    #[test]
    fn test_import_rejects_blank_table() {
        let (dir, db_path) = setup();
        let (result, _) = run(&cli(&db_path, Commands::Import {
            table: "  ".to_string(),
            file: dir.path().join("archive.json"),
        }));
        assert!(result.is_err());
    }
}
