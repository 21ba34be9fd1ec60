//! CLI для просмотра RDB дампов.
//!
//! Подкоманды: `count` (статистика), `keys` (ключи с типом, базой и
//! expiry), `dump` (записи целиком). Вывод в человекочитаемом виде или
//! JSON (одна запись на строку).

use std::{
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rdbscan::{
    logging::{init_logging, LoggingConfig},
    open, CountHandler, OutputFormat, Record, Settings, StackError, StatusCode, StreamingParser,
    Value,
};
use serde_json::json;
use tracing::debug;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

/// Основная структура CLI аргументов.
#[derive(Parser)]
#[command(name = "rdbscan-cli")]
#[command(version = env!("CARGO_PKG_VERSION"), long_version = LONG_VERSION)]
#[command(about = "Inspect RDB dump files", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Файл настроек (toml, json, yaml)
    #[arg(short, long, env = "RDBSCAN_CONFIG", help = "Путь к файлу настроек")]
    config: Option<PathBuf>,
    /// Включить подробный вывод (debug)
    #[arg(short, long, help = "Включить подробный вывод для отладки")]
    verbose: bool,
    /// Подавить логирование полностью
    #[arg(short = 'q', long, conflicts_with = "verbose", help = "Отключить логирование")]
    quiet: bool,
    /// Формат вывода результатов
    #[arg(long, value_enum, help = "Формат вывода (по умолчанию из настроек)")]
    output: Option<OutputFormat>,
    /// Подкоманда для выполнения
    #[command(subcommand)]
    command: Commands,
}

/// Подкоманды CLI
#[derive(Subcommand)]
enum Commands {
    /// Посчитать записи по типам и базам
    Count {
        #[arg(help = "Путь к дампу (по умолчанию dump_path из настроек)")]
        path: Option<PathBuf>,
    },
    /// Вывести ключи с типом, базой и временем истечения
    #[command(alias = "ls")]
    Keys {
        #[arg(help = "Путь к дампу (по умолчанию dump_path из настроек)")]
        path: Option<PathBuf>,
    },
    /// Вывести записи целиком
    Dump {
        #[arg(help = "Путь к дампу (по умолчанию dump_path из настроек)")]
        path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Код завершения берётся из `StatusCode` ошибки декодера, если она есть.
fn exit_code(err: &anyhow::Error) -> u8 {
    let code = err
        .chain()
        .find_map(|e| e.downcast_ref::<StackError>())
        .map(|e| e.status_code().exit_code())
        .unwrap_or_else(|| StatusCode::Unknown.exit_code());
    u8::try_from(code).unwrap_or(1)
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load().context("Failed to load settings")?,
    };

    init_logging(logging_config(&cli, &settings)).context("Failed to initialize logging")?;
    debug!(?settings, "settings loaded");

    let output = cli.output.unwrap_or(settings.output);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match &cli.command {
        Commands::Count { path } => count(&resolve_path(path, &settings)?, output, &mut out)?,
        Commands::Keys { path } => keys(&resolve_path(path, &settings)?, output, &mut out)?,
        Commands::Dump { path } => dump(&resolve_path(path, &settings)?, output, &mut out)?,
    }
    out.flush().context("Failed to flush output")?;
    Ok(())
}

/// `--quiet` и `--verbose` имеют приоритет над уровнем из настроек.
fn logging_config(
    cli: &Cli,
    settings: &Settings,
) -> LoggingConfig {
    let mut config = settings.logging_config();
    if cli.quiet {
        config.level = "off".to_string();
    } else if cli.verbose {
        config.level = "debug".to_string();
    }
    config
}

fn resolve_path(
    path: &Option<PathBuf>,
    settings: &Settings,
) -> Result<PathBuf> {
    path.clone()
        .or_else(|| settings.dump_path.clone())
        .ok_or_else(|| {
            anyhow::Error::new(StackError::new(rdbscan_error::GenericError::new(
                StatusCode::InvalidArgs,
                "no dump path given and dump_path is not configured",
            )))
        })
}

fn count(
    path: &Path,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let mut parser = StreamingParser::open(path)?;
    let mut handler = CountHandler::new();
    parser.parse(&mut handler)?;

    match output {
        OutputFormat::Json => {
            let by_type: serde_json::Map<_, _> = handler
                .by_type()
                .into_iter()
                .map(|(t, n)| (t.encoding_name().to_string(), json!(n)))
                .collect();
            let by_db: serde_json::Map<_, _> = handler
                .by_db()
                .into_iter()
                .map(|(db, n)| (db.to_string(), json!(n)))
                .collect();
            let report = json!({
                "version": handler.version().map(|v| v.get()),
                "records": handler.total_records(),
                "expiring": handler.expiring_records(),
                "by_type": by_type,
                "by_db": by_db,
                "checksum": handler.checksum().map(|c| format!("{c:016x}")),
            });
            writeln!(out, "{report}")?;
        }
        OutputFormat::Pretty => {
            if let Some(version) = handler.version() {
                writeln!(out, "version:  {version}")?;
            }
            writeln!(out, "records:  {}", handler.total_records())?;
            writeln!(out, "expiring: {}", handler.expiring_records())?;
            for (value_type, n) in handler.by_type() {
                writeln!(out, "  {:<20} {n}", value_type.encoding_name())?;
            }
            for (db, n) in handler.by_db() {
                writeln!(out, "  db{db:<18} {n}")?;
            }
        }
    }
    Ok(())
}

fn keys(
    path: &Path,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let mut session = open(path)?;
    while let Some(record) = session.next_record()? {
        match output {
            OutputFormat::Json => {
                let line = json!({
                    "key": record.key_str(),
                    "type": record.value_type,
                    "db": record.db,
                    "expire_at": record.expire_at,
                });
                writeln!(out, "{line}")?;
            }
            OutputFormat::Pretty => writeln!(
                out,
                "{}\t{}\tdb{}\t{}",
                record.key_str(),
                record.value_type,
                record.db,
                render_expiry(record.expire_at)
            )?,
        }
    }
    session.close();
    Ok(())
}

fn dump(
    path: &Path,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let mut session = open(path)?;
    while let Some(record) = session.next_record()? {
        match output {
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, &record)?;
                writeln!(out)?;
            }
            OutputFormat::Pretty => render_record(&record, out)?,
        }
    }
    session.close();
    Ok(())
}

fn render_expiry(expire_at: Option<u64>) -> String {
    match expire_at {
        None => "-".to_string(),
        Some(secs) => i64::try_from(secs)
            .ok()
            .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| secs.to_string()),
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn render_record(
    record: &Record,
    out: &mut impl Write,
) -> io::Result<()> {
    write!(out, "[db{}] {} ({})", record.db, record.key_str(), record.value_type)?;
    if record.has_expiry() {
        write!(out, " expires {}", render_expiry(record.expire_at))?;
    }
    writeln!(out)?;

    match &record.value {
        Value::Str(s) => writeln!(out, "  {:?}", lossy(s))?,
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                writeln!(out, "  {i}) {:?}", lossy(item))?;
            }
        }
        Value::Set(members) => {
            let mut members: Vec<_> = members.iter().map(|m| lossy(m)).collect();
            members.sort();
            for m in members {
                writeln!(out, "  - {m:?}")?;
            }
        }
        Value::SortedSet(members) => {
            for (score, m) in members {
                writeln!(out, "  {score} {:?}", lossy(m))?;
            }
        }
        Value::Hash(map) => {
            let mut pairs: Vec<_> = map.iter().map(|(k, v)| (lossy(k), lossy(v))).collect();
            pairs.sort();
            for (k, v) in pairs {
                writeln!(out, "  {k:?} => {v:?}")?;
            }
        }
    }
    Ok(())
}
