//! Gitenberg catalog: Project Gutenberg RDF catalog to sorted book records
//!
//! This crate turns the bzip2-compressed Project Gutenberg RDF catalog into an
//! ordered list of [`models::Record`]s, one per book that has a zipped
//! plain-text download, and persists that list for later reloads.
//!
//! # Pipeline
//!
//! 1. **Decompression** -- The source is read in fixed 2048-byte chunks and fed
//!    to an incremental bzip2 decoder; chunk and block boundaries never need to align
//! 2. **Markup parsing** -- A streaming XML parser emits start/text/end events,
//!    with element names kept as written (`pgterms:etext`, `dc:title`)
//! 3. **Record building** -- A state machine fills a working record from the
//!    typed leaf elements and commits it on record end; file descriptors pick
//!    the newest zipped plain-text variant for the record they point at
//! 4. **Finalization** -- Records without a file are dropped and the rest are
//!    stably sorted by lower-cased author then title
//! 5. **Persistence** -- The ordered list is written with bincode to a temporary
//!    file and renamed over the destination
//!
//! The whole run is synchronous and owns all of its state; nothing is shared
//! between runs.
//!
//! # Key Modules
//!
//! - [`pipeline`] -- Orchestration, persistence and opt-in reuse
//! - [`decompress`] -- Chunked bzip2 decoding
//! - [`parser`] -- Event parser with DOCTYPE entity expansion
//! - [`builder`] -- Record state machine and variant selection
//! - [`finalize`] -- Filter and sort
//! - [`store`] -- Atomic bincode persistence
//! - [`models`] -- The `Record` type
//! - [`error`] -- Failure kinds
//! - [`stats`] -- Run counters
//! - [`config`] -- Constants and run options
//!
//! # Example Usage
//!
//! ```no_run
//! use gitenberg_catalog::config::CatalogOptions;
//! use gitenberg_catalog::pipeline::CatalogPipeline;
//!
//! let options = CatalogOptions::new("catalog.rdf.bz2", "catalog.bin");
//! let run = CatalogPipeline::new(options).run()?;
//! println!("{} books", run.records.len());
//! # Ok::<(), gitenberg_catalog::error::CatalogError>(())
//! ```

pub mod builder;
pub mod config;
pub mod decompress;
pub mod error;
pub mod finalize;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod stats;
pub mod store;

pub use error::{CatalogError, Result};
pub use models::Record;
pub use pipeline::{CatalogPipeline, CatalogRun};
