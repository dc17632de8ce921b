pub mod calendar;
pub mod classify;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod logging;
pub mod persistence;
pub mod recurrence;
pub mod storage;
pub mod store;
pub mod task;
pub mod view;

use std::path::Path;

use tracing::info;

pub use crate::classify::{
  DateClassifier,
  DueClass
};
pub use crate::filter::{
  DateRange,
  FilterOptions
};
pub use crate::store::{
  Completion,
  TaskStore,
  ViewMode
};
pub use crate::task::{
  Priority,
  Repeat,
  Task,
  TaskDraft,
  TaskPatch
};
pub use crate::view::{
  SortDirection,
  SortKey,
  SortOptions
};

/// Loads configuration, installs logging and opens the file-backed
/// store with whatever was saved last.
#[tracing::instrument(skip_all)]
pub fn bootstrap(
  config_path: Option<&Path>
) -> anyhow::Result<(
  config::Config,
  TaskStore<storage::FileStorage>
)> {
  let cfg =
    config::Config::load(config_path)?;
  logging::init_tracing(&cfg.log_level)?;

  let store = TaskStore::open(&cfg)?;
  info!(
    tasks = store.tasks().len(),
    key = store.repository().key(),
    "task store ready"
  );
  Ok((cfg, store))
}
