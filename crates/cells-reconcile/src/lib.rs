//! Consistency repair for cells.
//!
//! Groups, door links and the region marketplace drift apart whenever regions
//! are deleted or reassigned outside this system. The [`ReconciliationEngine`]
//! walks all three and repairs what it safely can:
//!
//! 1. group regions that no longer exist
//! 2. door links to missing regions or to locations without a door
//! 3. ownership anomalies (reported only)
//! 4. regions that belong to no group, with a suggested group (reported only)
//! 5. door resync per linked region
//!
//! A failing marketplace never causes removals; it produces findings.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod engine;
pub mod error;
pub mod result;
pub mod scheduler;
pub mod suggest;

pub use engine::{ReconciliationEngine, SyncHandle};
pub use error::{ReconcileError, Result};
pub use result::{Finding, Pass, ReconcileMode, ReconciliationResult};
pub use scheduler::ReconcileScheduler;
pub use suggest::suggest_group;
