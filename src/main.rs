//! CLI entry point for `pdfcourier`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use pdfcourier::config::{self, Config};
use pdfcourier::flows;
use pdfcourier::ledger::csv::export_results_csv;
use pdfcourier::ledger::workbook::Workbook;
use pdfcourier::ledger::Ledger;
use pdfcourier::mail::eml_dir::EmlDirectory;
use pdfcourier::model::criteria::{parse_date_input, parse_keywords, SearchCriteria};
use pdfcourier::model::row::{LedgerRow, RowKey, RowUpdate};
use pdfcourier::storage::local::LocalStorage;

#[derive(Parser)]
#[command(
    name = "pdfcourier",
    version,
    about = "Find PDF attachments in a mailbox and file them into a folder tree",
    long_about = "Find PDF attachments in a mailbox and file them into a folder tree.\n\n\
                  Typical round: `init`, adjust `criteria`, `search`, review the rows \
                  (`rows`, `mark`), then `copy`."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory of .eml files to search
    #[arg(long, global = true, env = "PDFCOURIER_MAIL_DIR", value_name = "DIR")]
    mail_dir: Option<PathBuf>,

    /// Root of the folder tree attachments are copied into
    #[arg(long, global = true, env = "PDFCOURIER_STORAGE_DIR", value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Workbook file holding criteria, results, and the folder list
    #[arg(long, global = true, env = "PDFCOURIER_WORKBOOK", value_name = "FILE")]
    workbook: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the search and results sheets
    Init,
    /// Search the mailbox and list every PDF attachment found
    Search,
    /// Copy the selected, unprocessed attachments into storage
    Copy,
    /// Write the storage folder tree to the folders sheet
    Folders {
        /// How many levels below the root to list
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Use the checked folder of the folders sheet as the default destination
    SelectFolder,
    /// Show or change the search criteria
    Criteria {
        /// First day of the window (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last day of the window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Comma-separated subject keywords ("" clears them)
        #[arg(long)]
        keywords: Option<String>,
        /// Default destination folder path
        #[arg(long)]
        folder: Option<String>,
    },
    /// List the results rows
    Rows {
        #[arg(long)]
        json: bool,
    },
    /// Edit one results row
    Mark {
        /// Row number as shown by `rows`
        row: usize,
        /// Select the row for copying
        #[arg(long, conflicts_with = "deselect")]
        select: bool,
        /// Leave the row out of copying
        #[arg(long)]
        deselect: bool,
        /// File name to save under
        #[arg(long)]
        name: Option<String>,
        /// Destination folder path
        #[arg(long)]
        folder: Option<String>,
        /// Clear the result and both links so the row is copied again
        #[arg(long)]
        reset: bool,
    },
    /// Export the results rows to CSV
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Mailbox, storage, and workbook locations after CLI overrides.
struct Paths {
    mail: PathBuf,
    storage: PathBuf,
    workbook: PathBuf,
}

impl Paths {
    fn resolve(cli: &Cli, config: &Config) -> Self {
        Self {
            mail: cli.mail_dir.clone().unwrap_or_else(|| config::mail_dir(config)),
            storage: cli
                .storage_dir
                .clone()
                .unwrap_or_else(|| config::storage_root(config)),
            workbook: cli
                .workbook
                .clone()
                .unwrap_or_else(|| config::workbook_path(config)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let paths = Paths::resolve(&cli, &config);

    match cli.command {
        Commands::Init => cmd_init(&config, &paths),
        Commands::Search => cmd_search(&config, &paths),
        Commands::Copy => cmd_copy(&config, &paths),
        Commands::Folders { depth } => cmd_folders(&config, &paths, depth),
        Commands::SelectFolder => cmd_select_folder(&config, &paths),
        Commands::Criteria {
            start,
            end,
            keywords,
            folder,
        } => cmd_criteria(&config, &paths, start, end, keywords, folder),
        Commands::Rows { json } => cmd_rows(&config, &paths, json),
        Commands::Mark {
            row,
            select,
            deselect,
            name,
            folder,
            reset,
        } => {
            let selected = match (select, deselect) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cmd_mark(&config, &paths, row, selected, name, folder, reset)
        }
        Commands::Export { output } => cmd_export(&config, &paths, &output),
        Commands::Config { init } => cmd_config(&config, &paths, init),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "pdfcourier.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn open_ledger(config: &Config, paths: &Paths) -> anyhow::Result<Ledger<Workbook>> {
    let workbook = Workbook::open(&paths.workbook)?;
    Ok(Ledger::new(workbook, config.ledger.clone()))
}

fn open_mailbox(paths: &Paths) -> anyhow::Result<EmlDirectory> {
    if !paths.mail.is_dir() {
        anyhow::bail!("Mail directory not found: {}", paths.mail.display());
    }
    Ok(EmlDirectory::open(&paths.mail)?)
}

fn open_storage(paths: &Paths) -> anyhow::Result<LocalStorage> {
    LocalStorage::open(&paths.storage)
        .with_context(|| format!("opening storage root {}", paths.storage.display()))
}

fn progress_bar(label: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create the workbook sheets.
fn cmd_init(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let mut ledger = open_ledger(config, paths)?;
    flows::initialize(&mut ledger, today())?;

    println!();
    println!("  Workbook initialized: {}", paths.workbook.display());
    println!("  Set the search window with `pdfcourier criteria`, then run `pdfcourier search`.");
    println!();
    Ok(())
}

/// Search the mailbox and list the attachments in the results sheet.
fn cmd_search(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let mail = open_mailbox(paths)?;
    let mut storage = open_storage(paths)?;
    let mut ledger = open_ledger(config, paths)?;

    let report = flows::search_and_list(&mail, &mut storage, &mut ledger)?;

    use humansize::{format_size, BINARY};
    println!();
    if report.threads == 0 {
        println!("  No mail matches the search criteria.");
    } else {
        println!("  {:<25} {}", "Threads found", report.threads);
        println!("  {:<25} {}", "Attachments listed", report.rows);
        println!("  {:<25} {}", "Total size", format_size(report.bytes, BINARY));
        println!();
        println!("  Review the rows (`pdfcourier rows`, `pdfcourier mark`), then run `pdfcourier copy`.");
    }
    println!();
    Ok(())
}

/// Copy every selected row and print the outcome counts.
fn cmd_copy(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let mail = open_mailbox(paths)?;
    let mut storage = open_storage(paths)?;
    let mut ledger = open_ledger(config, paths)?;

    let pb = progress_bar("Copying")?;
    let report = flows::review_and_copy(&mail, &mut storage, &mut ledger, &mut |current, total| {
        pb.set_length(total as u64);
        pb.set_position(current as u64);
    })?;
    pb.finish_and_clear();

    println!();
    if report.total() == 0 {
        println!("  No rows are selected.");
    } else {
        println!("  Copy complete:");
        println!("  {:<25} {}", "Copied", report.succeeded);
        println!("  {:<25} {}", "Skipped (name taken)", report.skipped);
        println!("  {:<25} {}", "Failed", report.failed);
        println!("  {:<25} {}", "Already processed", report.already_processed);
    }
    println!();
    Ok(())
}

/// List the storage folders into the folders sheet.
fn cmd_folders(config: &Config, paths: &Paths, depth: Option<usize>) -> anyhow::Result<()> {
    let storage = open_storage(paths)?;
    let mut ledger = open_ledger(config, paths)?;
    let depth = depth.unwrap_or(config.storage.max_list_depth);

    let count = flows::list_storage_folders(&storage, &mut ledger, depth)?;

    println!();
    println!("  {count} folder(s) written to the '{}' sheet.", config.ledger.folders_sheet);
    println!("  Check one of them, then run `pdfcourier select-folder`.");
    println!();
    Ok(())
}

/// Make the checked folder the default destination.
fn cmd_select_folder(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let mut ledger = open_ledger(config, paths)?;
    let selection = flows::apply_selected_folder(&mut ledger)?;

    println!();
    println!("  Default destination set:");
    println!("  {:<25} {}", "Folder", selection.name);
    println!("  {:<25} {}", "Path", selection.path);
    println!();
    Ok(())
}

/// Show the criteria, or update the fields given on the command line.
fn cmd_criteria(
    config: &Config,
    paths: &Paths,
    start: Option<String>,
    end: Option<String>,
    keywords: Option<String>,
    folder: Option<String>,
) -> anyhow::Result<()> {
    let mut ledger = open_ledger(config, paths)?;
    let changing = start.is_some() || end.is_some() || keywords.is_some() || folder.is_some();

    let criteria = if changing {
        let current = ledger.read_criteria().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Current criteria unreadable, starting from defaults");
            SearchCriteria::default_for(today())
        });
        let updated = SearchCriteria::new(
            start.as_deref().map(parse_date_input).transpose()?.unwrap_or(current.start_date),
            end.as_deref().map(parse_date_input).transpose()?.unwrap_or(current.end_date),
            keywords.as_deref().map(parse_keywords).unwrap_or(current.keywords),
            folder.as_deref().unwrap_or(&current.folder_path),
        )?;
        ledger.write_criteria(&updated)?;
        updated
    } else {
        ledger.read_criteria()?
    };

    let keys = &config.ledger.search_keys;
    println!();
    println!("  {:<25} {}", keys.start_date, criteria.start_date);
    println!("  {:<25} {}", keys.end_date, criteria.end_date);
    println!("  {:<25} {}", keys.keywords, criteria.keywords.join(", "));
    println!("  {:<25} {}", keys.folder_path, criteria.folder_path);
    println!();
    Ok(())
}

/// Print the results rows.
fn cmd_rows(config: &Config, paths: &Paths, json: bool) -> anyhow::Result<()> {
    let ledger = open_ledger(config, paths)?;
    let rows = ledger.list_rows()?;
    if json {
        print_rows_json(&rows)
    } else {
        print_rows_table(&rows);
        Ok(())
    }
}

/// Apply one operator edit to a results row.
fn cmd_mark(
    config: &Config,
    paths: &Paths,
    row: usize,
    selected: Option<bool>,
    name: Option<String>,
    folder: Option<String>,
    reset: bool,
) -> anyhow::Result<()> {
    let mut ledger = open_ledger(config, paths)?;

    let mut update = if reset {
        RowUpdate::reset(RowKey(row))
    } else {
        RowUpdate::for_row(RowKey(row))
    };
    update.selected = selected;
    update.save_name = name;
    update.save_folder = folder;
    ledger.apply_updates(&[update])?;

    let rows = ledger.list_rows()?;
    if let Some(edited) = rows.iter().find(|r| r.key == RowKey(row)) {
        print_rows_table(std::slice::from_ref(edited));
    }
    Ok(())
}

/// Export the results rows to CSV.
fn cmd_export(config: &Config, paths: &Paths, output: &Path) -> anyhow::Result<()> {
    let ledger = open_ledger(config, paths)?;
    let rows = ledger.list_rows()?;

    let csv_path = if output.extension().is_some() {
        output.to_path_buf()
    } else {
        output.join("results.csv")
    };
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    export_results_csv(&rows, &config.ledger.headers, &csv_path)?;
    println!("  Exported {} row(s) to {}", rows.len(), csv_path.display());
    Ok(())
}

/// Print the effective configuration, optionally writing a default file.
fn cmd_config(config: &Config, paths: &Paths, init: bool) -> anyhow::Result<()> {
    let path = config::config_file_path();
    if init {
        match path {
            Some(ref p) if p.exists() => {
                println!("  Config file already exists: {}", p.display());
            }
            _ => {
                config::save_config(&Config::default())?;
                if let Some(ref p) = path {
                    println!("  Wrote default config to {}", p.display());
                }
            }
        }
        return Ok(());
    }

    println!();
    match path {
        Some(ref p) => println!("  {:<25} {}", "Config file", p.display()),
        None => println!("  {:<25} (none)", "Config file"),
    }
    println!("  {:<25} {}", "Mail directory", paths.mail.display());
    println!("  {:<25} {}", "Storage root", paths.storage.display());
    println!("  {:<25} {}", "Workbook", paths.workbook.display());
    println!("  {:<25} {}", "Log file", config::log_file_path(config).display());
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "pdfcourier", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print rows as a human-readable table.
fn print_rows_table(rows: &[LedgerRow]) {
    println!();
    println!("  {} row(s)", rows.len());
    println!();

    if rows.is_empty() {
        return;
    }

    println!(
        "  {:>4} {:<3} {:<19} {} {} {}",
        "Row",
        "Sel",
        "Received",
        fit("Subject", 36),
        fit("Attachment", 24),
        "Result"
    );
    println!("  {}", "-".repeat(110));

    for row in rows {
        println!(
            "  {:>4} {:<3} {:<19} {} {} {}",
            row.key,
            if row.selected { "[x]" } else { "[ ]" },
            row.received_at,
            fit(&row.title, 36),
            fit(&row.attachment_name, 24),
            fit(&row.result.to_string(), 30)
        );
    }
    println!();
}

/// Print rows as JSON.
fn print_rows_json(rows: &[LedgerRow]) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            serde_json::json!({
                "row": r.key.0,
                "selected": r.selected,
                "subject": r.title,
                "received": r.received_at,
                "attachment": r.attachment_name,
                "save_name": r.save_name,
                "save_folder": r.save_folder,
                "result": r.result.to_string(),
                "file_link": r.file_link,
                "folder_link": r.folder_link,
            })
        })
        .collect();

    let output = serde_json::json!({
        "row_count": rows.len(),
        "rows": items,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Truncate `s` to `width` display columns, adding "..." if needed, and pad
/// with spaces to exactly `width` columns.
fn fit(s: &str, width: usize) -> String {
    let mut out = if UnicodeWidthStr::width(s) <= width {
        s.to_string()
    } else if width <= 3 {
        s.chars().take(width).collect()
    } else {
        let mut result = String::new();
        let mut current = 0;
        for ch in s.chars() {
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            if current + ch_width + 3 > width {
                break;
            }
            result.push(ch);
            current += ch_width;
        }
        result.push_str("...");
        result
    };
    let used = UnicodeWidthStr::width(out.as_str());
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}
