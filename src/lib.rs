//! # rowlift
//!
//! Replays relational rows exported as SQL `INSERT` statements into a
//! REST-fronted datastore, reconciling against what is already there so the
//! same export can be imported any number of times.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐
//! │ export.sql │──▶│  Decode  │──▶│  Fixups  │──▶│  Filter vs │
//! │ one INSERT │   │ literals │   │ per table│   │ remote ids │
//! │  per line  │   └──────────┘   └──────────┘   └─────┬──────┘
//! └────────────┘                                       ▼
//!                               ┌───────────────────────────────┐
//!                               │ Upload: chunk → bulk write     │
//!                               │   on failure → one per record  │
//!                               └───────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rowlift tables                          # check configured tables
//! rowlift decode w_contacts | head        # inspect decoded records
//! rowlift import w_contacts --dry-run     # count what would be sent
//! rowlift import w_contacts               # import; safe to re-run
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credential resolution |
//! | [`models`] | Decoded values, records and identifiers |
//! | [`decode`] | INSERT statement decoder |
//! | [`fixup`] | Declared per-column value corrections |
//! | [`encode`] | Render records back to INSERT statements |
//! | [`remote`] | Remote datastore trait and REST client |
//! | [`existing`] | Paginated snapshot of identifiers already imported |
//! | [`upload`] | Chunked upload with per-record fallback |
//! | [`import`] | End-to-end import pipeline |
//! | [`preview`] | Offline `decode` and `emit` commands |
//! | [`tables`] | Table listing |
//! | [`progress`] | Progress reporting on stderr |

pub mod config;
pub mod decode;
pub mod encode;
pub mod existing;
pub mod fixup;
pub mod import;
pub mod models;
pub mod preview;
pub mod progress;
pub mod remote;
pub mod tables;
pub mod upload;
