//! Sponsored-post extraction for a live page.
//!
//! The pipeline runs per scan pass: find candidate posts, classify them,
//! resolve each ad's identifier through its menu, fetch and parse the
//! targeting disclosure, then dedup and hand the batch to an [`AdStore`].

pub mod advert;
pub mod classify;
pub mod disclosure;
pub mod error;
pub mod extractor;
pub mod focus;
pub mod host;
pub mod markup;
pub mod model;
pub mod resolver;
pub mod sanitize;
pub mod scanner;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod targeting;

pub use disclosure::{DisclosureFetcher, HttpDisclosureFetcher};
pub use error::{ExtractError, ScanError};
pub use extractor::{Extracted, Extraction, ExtractionState, ExtractionTiming};
pub use host::{HostDocument, Rect, Viewport};
pub use model::{AdRecord, Disclosure, Identifier, Target, TargetKind};
pub use scanner::{ScanCounts, ScanOutcome, ScanReport, ScanTrigger, Scanner};
pub use session::SessionState;
pub use snapshot::SnapshotDocument;
pub use store::{AdStore, MemoryStore};
pub use targeting::parse_disclosure;
