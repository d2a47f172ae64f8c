//! Ladder scan engine
//!
//! - [`tally`]: per-category counting and retention
//! - [`session`]: resumable scan state
//! - [`controller`]: the page loop, show more, cancellation
//! - [`lookup`]: point lookup of a character by name
//! - [`neighbors`]: race comparison around a tracked character

pub mod controller;
pub mod lookup;
pub mod neighbors;
pub mod session;
pub mod tally;

pub use controller::{ScanController, ScanReport, ScanTask};
pub use lookup::{LookupOrigin, LookupOutcome, LookupReport, LookupRequest, PointLookupEngine};
pub use neighbors::{resolve_neighbors, NeighborResolver, RaceHandle, RaceTracker};
pub use session::{ScanRequest, ScanSession, ScanState, StopReason};
pub use tally::{Observation, SubclassTally};
