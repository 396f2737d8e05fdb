//! clipstash command line: run the clipboard monitor, or browse and manage the history.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clipstash::config::{AppConfig, DataLocation};
use clipstash::logging;
use clipstash::models::{format_file_size, parse_megabytes};
use clipstash::monitor::{run_monitor, ClipboardSource, MonitorConfig, SystemClipboard};
use clipstash::search::{generate_preview, PREVIEW_CHARS};
use clipstash::{
    CapturePolicy, CaptureScope, ClipboardStore, ClipboardStoreApi, FileSortField, RecordKind,
    SearchScope, Settings, SettingsUpdate, TextSortField,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "Clipboard history with content deduplication", long_about = None)]
struct Cli {
    /// Config file (TOML). Defaults to <config dir>/clipstash/config.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the database and saved file copies
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the system clipboard and record every change
    Monitor {
        /// Poll interval in seconds
        #[arg(short, long)]
        interval: Option<f64>,
    },
    /// List recorded texts or files
    List {
        #[arg(value_enum, default_value_t = Kind::Text)]
        kind: Kind,
        /// Sort column, e.g. timestamp, occurrence-count, char-count, filename, file-size
        #[arg(short, long, default_value = "timestamp")]
        sort: String,
        /// Ascending instead of newest/largest first
        #[arg(long)]
        asc: bool,
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Case-insensitive substring search over texts and filenames
    Search {
        keyword: String,
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },
    /// Record counts and saved file size
    Stats,
    /// Delete one record
    Delete {
        #[arg(value_enum)]
        kind: Kind,
        id: i64,
    },
    /// Delete every record and saved copy. Settings are kept
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Apply the retention policy now
    Purge,
    /// Put a recorded text back on the clipboard
    Copy { id: i64 },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsCommand>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    Set(SetArgs),
    /// Restore defaults
    Reset,
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Largest single file and largest total per copy, in MB
    #[arg(long)]
    max_copy_size_mb: Option<String>,
    /// Most files recorded from one copy
    #[arg(long)]
    max_copy_count: Option<u32>,
    /// Ignore size and count limits
    #[arg(long)]
    unlimited: Option<bool>,
    /// Days to keep records; 0 keeps them forever
    #[arg(long)]
    retention_days: Option<u32>,
    #[arg(long)]
    auto_start: Option<bool>,
    #[arg(long)]
    float_icon: Option<bool>,
    /// Floating icon opacity, 5 to 100
    #[arg(long)]
    opacity: Option<u8>,
    #[arg(long, value_enum)]
    capture_scope: Option<CaptureScopeArg>,
}

impl SetArgs {
    fn into_update(self) -> Result<SettingsUpdate> {
        let max_copy_size = self.max_copy_size_mb.as_deref().map(parse_megabytes).transpose()?;
        Ok(SettingsUpdate {
            max_copy_size,
            max_copy_count: self.max_copy_count,
            unlimited_mode: self.unlimited,
            retention_days: self.retention_days,
            auto_start: self.auto_start,
            float_icon_enabled: self.float_icon,
            float_icon_opacity: self.opacity,
            clipboard_capture_scope: self.capture_scope.map(Into::into),
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Text,
    Files,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ScopeArg {
    All,
    Text,
    Files,
}

impl From<ScopeArg> for SearchScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::All => SearchScope::All,
            ScopeArg::Text => SearchScope::TextOnly,
            ScopeArg::Files => SearchScope::FileOnly,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CaptureScopeArg {
    All,
    TextOnly,
}

impl From<CaptureScopeArg> for CaptureScope {
    fn from(scope: CaptureScopeArg) -> Self {
        match scope {
            CaptureScopeArg::All => CaptureScope::All,
            CaptureScopeArg::TextOnly => CaptureScope::TextOnly,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_settings(settings: &Settings, json: bool) -> Result<()> {
    if json {
        return print_json(settings);
    }
    println!("max copy size:     {}", format_file_size(settings.max_copy_size));
    println!("max copy count:    {}", settings.max_copy_count);
    println!("unlimited mode:    {}", settings.unlimited_mode);
    match settings.retention_days {
        0 => println!("retention:         forever"),
        days => println!("retention:         {} days", days),
    }
    println!("auto start:        {}", settings.auto_start);
    println!("float icon:        {}", settings.float_icon_enabled);
    println!("float icon alpha:  {}%", settings.float_icon_opacity);
    println!("capture scope:     {}", settings.clipboard_capture_scope.as_str());
    Ok(())
}

async fn monitor(
    store: ClipboardStore,
    location: &DataLocation,
    config: &AppConfig,
    interval: Option<f64>,
) -> Result<()> {
    let mut monitor_config = MonitorConfig::from(config);
    if let Some(secs) = interval {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--interval must be a positive number of seconds");
        }
        monitor_config.poll_interval = Duration::from_secs_f64(secs);
    }

    let source: Arc<dyn ClipboardSource> = Arc::new(SystemClipboard::new()?);
    let policy = CapturePolicy::new(&location.files_dir);

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    eprintln!("Recording clipboard into {} (Ctrl-C to stop)", location.root.display());
    run_monitor(Arc::new(store), source, policy, monitor_config, token)
        .await
        .context("clipboard monitor stopped")
}

fn list(
    store: &ClipboardStore,
    kind: Kind,
    sort: &str,
    descending: bool,
    limit: Option<u32>,
    offset: Option<u32>,
    json: bool,
) -> Result<()> {
    match kind {
        Kind::Text => {
            let records = store.list_text(TextSortField::from_name(sort), descending, limit, offset)?;
            if json {
                return print_json(&records);
            }
            for r in &records {
                println!(
                    "{:>6}  {}  x{:<3} {:>6} chars  {}",
                    r.id,
                    r.timestamp.format("%Y-%m-%d %H:%M"),
                    r.occurrence_count,
                    r.char_count,
                    generate_preview(&r.content, PREVIEW_CHARS)
                );
            }
        }
        Kind::Files => {
            let records = store.list_files(FileSortField::from_name(sort), descending, limit, offset)?;
            if json {
                return print_json(&records);
            }
            for r in &records {
                println!(
                    "{:>6}  {}  x{:<3} {:>9}  {:<9}  {}",
                    r.id,
                    r.timestamp.format("%Y-%m-%d %H:%M"),
                    r.occurrence_count,
                    format_file_size(r.file_size),
                    r.file_type_category.as_str(),
                    r.filename
                );
            }
        }
    }
    Ok(())
}

async fn search(store: &ClipboardStore, keyword: String, scope: ScopeArg, json: bool) -> Result<()> {
    let hits = store.search(keyword, scope.into()).await?;
    if json {
        return print_json(&hits);
    }
    for hit in &hits {
        let kind = match hit.kind {
            RecordKind::Text => "text",
            RecordKind::File => "file",
        };
        println!(
            "{:>4} {:>6}  {}  {}",
            kind,
            hit.id,
            hit.timestamp.format("%Y-%m-%d %H:%M"),
            generate_preview(&hit.display_text, PREVIEW_CHARS)
        );
    }
    if hits.is_empty() {
        eprintln!("No matches");
    }
    Ok(())
}

fn clear(store: &ClipboardStore, yes: bool) -> Result<()> {
    if !yes {
        bail!("this deletes every recorded text and file; pass --yes to confirm");
    }
    store.clear_all()?;
    println!("History cleared");
    Ok(())
}

fn settings(store: &ClipboardStore, action: Option<SettingsCommand>, json: bool) -> Result<()> {
    match action.unwrap_or(SettingsCommand::Show) {
        SettingsCommand::Show => print_settings(&store.get_settings()?, json),
        SettingsCommand::Reset => print_settings(&store.reset_settings()?, json),
        SettingsCommand::Set(args) => {
            let update = args.into_update()?;
            if update.is_empty() {
                bail!("nothing to change; see `clipstash settings set --help`");
            }
            let retention_changed = update.retention_days.is_some();
            let settings = store.update_settings(update)?;
            if retention_changed {
                let purged = store.purge_expired()?;
                if purged.total() > 0 && !json {
                    println!(
                        "Purged {} texts and {} files past retention",
                        purged.texts_removed, purged.files_removed
                    );
                }
            }
            print_settings(&settings, json)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    logging::init(&config.log_filter);

    let roots = config.candidate_roots(cli.data_dir.as_deref());
    let (store, location) = ClipboardStore::open_first_available(&roots)?;
    let json = cli.json;

    match cli.command {
        Command::Monitor { interval } => monitor(store, &location, &config, interval).await,
        Command::List { kind, sort, asc, limit, offset } => {
            list(&store, kind, &sort, !asc, limit, offset, json)
        }
        Command::Search { keyword, scope } => search(&store, keyword, scope, json).await,
        Command::Stats => {
            let stats = store.statistics()?;
            if json {
                return print_json(&stats);
            }
            println!("texts: {}", stats.text_count);
            println!("files: {} ({})", stats.file_count, format_file_size(stats.total_file_bytes));
            Ok(())
        }
        Command::Delete { kind, id } => {
            let deleted = match kind {
                Kind::Text => store.delete_text(id)?,
                Kind::Files => store.delete_file(id)?,
            };
            if !deleted {
                bail!("no {} record with id {}", if kind == Kind::Text { "text" } else { "file" }, id);
            }
            Ok(())
        }
        Command::Clear { yes } => clear(&store, yes),
        Command::Purge => {
            let summary = store.purge_expired()?;
            if json {
                return print_json(&summary);
            }
            println!("Purged {} texts and {} files", summary.texts_removed, summary.files_removed);
            Ok(())
        }
        Command::Copy { id } => {
            let record = store
                .get_text(id)?
                .with_context(|| format!("no text record with id {}", id))?;
            let clipboard = SystemClipboard::new()?;
            if cfg!(target_os = "linux") {
                eprintln!("Holding the clipboard until another application copies");
            }
            tokio::task::spawn_blocking(move || clipboard.set_text(&record.content))
                .await
                .context("clipboard task failed")??;
            Ok(())
        }
        Command::Settings { action } => settings(&store, action, json),
    }
}
