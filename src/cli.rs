use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::path::{Path, PathBuf};
use thiserror::Error;

use filesweep_lib::file_search::filters;
use filesweep_lib::{
    locate_file, quick_search, Answer, AutoConfirm, ConsolePrompt, DeletionEngine,
    DeletionOutcome, DeletionReport, DeletionSummary, FileMatch, FileScanner, FilterError,
    NamePattern, ScanError, ScanMode, ScanReport, ScanRequest, SearchConfig, Selection,
    UserPrompt, SEARCH_CONFIG,
};

#[derive(Parser)]
#[command(
    name = "filesweep",
    about = "Find files by size, date, name and content, then delete them",
    version
)]
pub struct Cli {
    /// Log internal diagnostics as well as progress
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Append log output to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Recursive search with depth and file-count limits
    Search(SearchArgs),

    /// Match a glob against the files directly inside one directory
    Quick {
        dir: PathBuf,

        /// File name glob, e.g. "*.txt", "*southside*" or "*.{log,tmp}"
        glob: String,

        #[command(flatten)]
        filters: RangeArgs,

        /// Delete these entries without asking, e.g. "1-2,4" or "all"
        #[arg(long)]
        delete: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up one file by its full path
    Check {
        path: PathBuf,

        /// Delete the file if it exists
        #[arg(long)]
        delete: bool,
    },
}

#[derive(Args)]
pub struct RangeArgs {
    /// Size in MB: "100" (at least), "-50" (at most) or "50-200"
    #[arg(long, default_value = "")]
    pub size: String,

    /// Modified on or after this day (yyyy-mm-dd)
    #[arg(long, default_value = "")]
    pub since: String,

    /// Modified on or before this day (yyyy-mm-dd); the whole day is included
    #[arg(long, default_value = "")]
    pub until: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Directory to search; defaults to the home directory
    pub root: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Mode::Normal)]
    pub mode: Mode,

    /// Maximum directory depth (overrides the mode preset)
    #[arg(long)]
    pub depth: Option<String>,

    /// Files to scan before asking whether to continue (overrides the mode preset)
    #[arg(long)]
    pub limit: Option<String>,

    #[command(flatten)]
    pub filters: RangeArgs,

    /// Whitespace separated words that must all appear in the name or content
    #[arg(long, default_value = "")]
    pub keywords: String,

    /// Case-insensitive regex the whole file name must match
    #[arg(long, conflicts_with = "name_glob")]
    pub name_regex: Option<String>,

    /// File name glob: *, ?, [0-9] classes and {a,b} alternatives
    #[arg(long)]
    pub name_glob: Option<String>,

    /// Skip evaluating files larger than this many MB
    #[arg(long, default_value = "")]
    pub max_file_size: String,

    /// Do not follow symbolic links
    #[arg(long)]
    pub no_follow: bool,

    /// Delete these entries without asking, e.g. "1-2,4" or "all"
    #[arg(long)]
    pub delete: Option<String>,

    /// Answer yes to every "keep scanning?" question
    #[arg(long)]
    pub yes: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    Normal,
    Deep,
}

impl From<Mode> for ScanMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Normal => ScanMode::Normal,
            Mode::Deep => ScanMode::Deep,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("{0}")]
    Other(String),
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = SEARCH_CONFIG.clone();
    match cli.command {
        Command::Search(args) => search(args, config).await,
        Command::Quick {
            dir,
            glob,
            filters: ranges,
            delete,
            json,
        } => {
            let pattern = NamePattern::from_glob(&glob)?;
            debug!("Quick search in {} for '{}'", dir.display(), pattern.source());
            if pattern.is_literal_glob() {
                info!("'{}' has no wildcards; only that exact name matches", glob);
            }
            let size = filters::parse_size_range(&ranges.size)?;
            let modified = filters::parse_date_range(&ranges.since, &ranges.until)?;
            let matches = quick_search(&dir, &pattern, size, modified)?;
            if json {
                print_json(&matches)?;
            } else {
                print_matches(&matches);
            }
            finish(&matches, delete.as_deref(), json, &config).await
        }
        Command::Check { path, delete } => {
            let Some(file) = locate_file(&path) else {
                println!("No file found at {}", path.display());
                return Ok(());
            };
            print_matches(std::slice::from_ref(&file));
            if delete {
                let engine = DeletionEngine::new(&config);
                let outcome = engine.delete_path(file.path()).await;
                print_outcome(file.path(), &outcome);
            }
            Ok(())
        }
    }
}

async fn search(args: SearchArgs, config: SearchConfig) -> Result<(), CliError> {
    let root = match args.root {
        Some(root) => root,
        None => dirs::home_dir()
            .ok_or_else(|| CliError::Other("Could not determine the home directory".into()))?,
    };

    let mut request = ScanRequest::with_mode(root, args.mode.into())
        .size(filters::parse_size_range(&args.filters.size)?)
        .modified(filters::parse_date_range(
            &args.filters.since,
            &args.filters.until,
        )?)
        .keywords(filters::parse_keywords(&args.keywords))
        .follow_links(!args.no_follow);
    if let Some(depth) = &args.depth {
        request = request.max_depth(filters::parse_positive(depth)? as usize);
    }
    if let Some(limit) = &args.limit {
        request = request.max_files(filters::parse_positive(limit)?);
    }
    if let Some(regex) = &args.name_regex {
        if let Some(pattern) = filters::compile_name_regex(regex)? {
            request = request.name_pattern(pattern);
        }
    }
    if let Some(glob) = &args.name_glob {
        request = request.name_pattern(NamePattern::from_glob(glob)?);
    }
    if let Some(bytes) = filters::parse_megabytes(&args.max_file_size)? {
        request = request.max_file_size(bytes);
    }

    let report = if args.yes {
        run_scan(config.clone(), AutoConfirm(true), request).await?
    } else {
        run_scan(config.clone(), ConsolePrompt, request).await?
    };

    if args.json {
        print_json(&report)?;
    } else {
        print_matches(&report.matches);
        println!(
            "{} scanned, {} matched ({}), {} inaccessible",
            report.summary.scanned,
            report.matches.len(),
            ByteSize(report.total_size()),
            report.summary.inaccessible
        );
        if report.is_partial() {
            println!("Results are partial: the scan did not finish");
        }
    }

    finish(&report.matches, args.delete.as_deref(), args.json, &config).await
}

/// The scanner blocks on the walk and on user prompts, so it gets its own
/// blocking thread.
async fn run_scan<P: UserPrompt + 'static>(
    config: SearchConfig,
    prompt: P,
    request: ScanRequest,
) -> Result<ScanReport, CliError> {
    let scanner = FileScanner::new(config, prompt);
    let report = tokio::task::spawn_blocking(move || scanner.scan(request))
        .await
        .map_err(|e| CliError::Other(format!("Scan task failed: {}", e)))??;
    Ok(report)
}

/// Ask for (or take) a selection, delete it and print the outcome.
async fn finish(
    matches: &[FileMatch],
    delete: Option<&str>,
    json: bool,
    config: &SearchConfig,
) -> Result<(), CliError> {
    if matches.is_empty() {
        return Ok(());
    }

    let selection = match delete {
        Some(input) => Selection::parse(input, matches.len()),
        // JSON output is for scripts; never block on stdin there
        None if json => return Ok(()),
        None => match ask_selection(matches.len()) {
            Some(selection) => selection,
            None => return Ok(()),
        },
    };
    if selection.is_empty(matches.len()) {
        info!("Nothing selected; no files were deleted");
        return Ok(());
    }

    let engine = DeletionEngine::new(config);
    let reports = engine.delete(matches, &selection).await;

    if json {
        print_json(&reports)?;
    } else {
        print_reports(&reports);
    }
    Ok(())
}

fn ask_selection(len: usize) -> Option<Selection> {
    let prompt = ConsolePrompt;
    let answer = prompt.ask_line(&format!(
        "Files to delete (1-{}, e.g. 1-2,4 or all; empty keeps everything):",
        len
    ));
    let selection = match answer {
        Answer::Cancelled => return None,
        Answer::Line(line) => Selection::parse(&line, len),
    };
    let count = selection.indices(len).len();
    if count == 0 {
        return Some(selection);
    }
    match prompt.confirm(&format!("Delete {} file(s)?", count), false) {
        Some(true) => Some(selection),
        _ => None,
    }
}

fn print_matches(matches: &[FileMatch]) {
    if matches.is_empty() {
        println!("No matching files.");
        return;
    }
    for (i, file) in matches.iter().enumerate() {
        let modified = file
            .last_modified()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{}] {} ({}, modified {})",
            i + 1,
            file.path().display(),
            ByteSize(file.size()),
            modified
        );
    }
}

fn print_outcome(path: &Path, outcome: &DeletionOutcome) {
    let path = path.display();
    match outcome {
        DeletionOutcome::Deleted { forced: false } => println!("deleted      {}", path),
        DeletionOutcome::Deleted { forced: true } => println!("force-deleted {}", path),
        DeletionOutcome::NotFound => println!("not found    {}", path),
        DeletionOutcome::DeniedAfterRetry { terminated, reason } => {
            println!("failed       {} ({})", path, reason);
            if !terminated.is_empty() {
                println!("             terminated pids: {:?}", terminated);
            }
        }
    }
}

fn print_reports(reports: &[DeletionReport]) {
    for report in reports {
        print_outcome(&report.path, &report.outcome);
    }
    let summary = DeletionSummary::from_reports(reports);
    println!(
        "{} deleted ({} forced), {} not found, {} failed",
        summary.deleted, summary.forced, summary.not_found, summary.failed
    );
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Other(format!("Failed to encode JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}
