//! Files written at the end of a run.
//!
//! - [`json`]: the batch response envelope, one file per run
//! - [`history`]: the crisis history store read before and appended after a batch
//!
//! ```text
//! output_dir/
//! ├── 2025-05-06/
//! │   └── batch_093012.json
//! └── history.json          # default crisis history location
//! ```

pub mod history;
pub mod json;
