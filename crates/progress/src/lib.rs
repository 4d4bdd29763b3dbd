//! Progress aggregation for library trees.
//!
//! The [`Aggregator`] keeps folder completion in step with the books below
//! it; [`Library`] serializes playback ticks and structural edits over one
//! store, and [`spawn_library_worker`] runs a library behind a mailbox.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod aggregator;
pub mod library;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::{AggregatorConfig, LibraryConfig};
pub use error::{AggregateError, AggregateResult, LibraryError, Result};
pub use aggregator::{Aggregator, PropagationReport, StopReason};
pub use library::{ApplyFuture, CommandOutcome, Library, RebuildReport};
pub use worker::{spawn_library_worker, LibraryHandle};
