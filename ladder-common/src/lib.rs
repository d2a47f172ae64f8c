//! # Ladder Tracker Common Library
//!
//! Shared code for the ladder tracker crates including:
//! - Ladder models (ranked entries, leagues, category vocabularies)
//! - Configuration loading and resolution
//! - Event types and the broadcast EventBus
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    CategoryVocabulary, FoundEntryContext, LadderMode, League, LeagueTarget, Neighbor, NeighborPair,
    RaceStandings, RankedEntry, Standing,
};
