pub mod browser;
pub mod config;
pub mod extractor;
pub mod input_loader;
pub mod ledger;
pub mod logger;
pub mod pacing;
pub mod qualifier;
pub mod session;
pub mod sink;

// Exporting types for convenience
pub use browser::{ChromePage, ElemHandle, PageAccessor};
pub use config::{SafetyBudget, SearchQuery, Settings};
pub use extractor::{JobExtractor, JobRecord};
pub use ledger::SessionLedger;
pub use qualifier::{QualificationVerdict, Qualifier, WorkArrangement};
pub use session::{ScreenedJob, Session, SessionControl, SessionState, SessionStatus};
