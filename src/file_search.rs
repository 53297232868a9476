mod deleter;
pub mod error;
pub mod filters;
pub mod lock_resolver;
pub mod predicates;
pub mod process_control;
pub mod prompt;
pub mod quick;
mod scanner;
mod selection;
pub mod types;
mod walker;


pub use deleter::{DeletionEngine, FileRemover, FsRemover};
pub use error::{FilterError, ScanError};
pub use lock_resolver::{LockResolver, NoopResolver, SystemResolver};
pub use predicates::{DateRange, NamePattern, SizeRange};
pub use prompt::{Answer, AutoConfirm, ConsolePrompt, ScriptedPrompt, UserPrompt};
pub use quick::{locate_file, quick_search};
pub use scanner::FileScanner;
pub use selection::Selection;
pub use types::{
    DeletionOutcome, DeletionReport, DeletionSummary, FileMatch, ScanReport, ScanRequest,
    ScanState, ScanSummary,
};
pub use walker::{
    is_skipped_dir_name, FileEntry, ThrottleSettings, Threshold, TreeWalker, WalkEvent,
};
