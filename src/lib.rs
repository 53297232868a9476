mod logging;

pub mod config;
pub mod file_search;
pub mod ops;

pub use config::{ScanMode, SearchConfig, SEARCH_CONFIG};
pub use file_search::{
    locate_file, quick_search, Answer, AutoConfirm, ConsolePrompt, DateRange, DeletionEngine,
    DeletionOutcome, DeletionReport, DeletionSummary, FileMatch, FileRemover, FileScanner,
    FilterError, FsRemover, LockResolver, NamePattern, NoopResolver, ScanError, ScanReport,
    ScanRequest, ScanSummary, ScriptedPrompt, Selection, SizeRange, SystemResolver, UserPrompt,
};
pub use logging::{init as init_logging, DETAIL_TARGET, EVENT_TARGET};
pub use ops::ScanPhase;
