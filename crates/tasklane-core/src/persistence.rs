use anyhow::Context;
use tracing::{
  debug,
  error,
  warn
};

use crate::storage::KeyValueStorage;
use crate::task::Task;

/// Key the task collection lives under.
pub const STORAGE_KEY: &str =
  "task-tracker-tasks";

/// Reads and writes the whole task collection as one JSON array under a
/// single storage key. Both directions are best effort: a missing or
/// unreadable blob loads as an empty collection and a failed write is
/// logged and dropped.
#[derive(Debug, Clone)]
pub struct TaskRepository<S> {
  storage: S,
  key:     String
}

impl<S: KeyValueStorage> TaskRepository<S> {
  pub fn new(storage: S) -> Self {
    Self::with_key(storage, STORAGE_KEY)
  }

  pub fn with_key(
    storage: S,
    key: impl Into<String>
  ) -> Self {
    Self {
      storage,
      key: key.into()
    }
  }

  #[must_use]
  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  #[tracing::instrument(skip(self), fields(key = %self.key))]
  pub fn load(&self) -> Vec<Task> {
    match self.try_load() {
      | Ok(tasks) => {
        debug!(
          count = tasks.len(),
          "loaded tasks"
        );
        tasks
      }
      | Err(err) => {
        error!(
          error = %format!("{err:#}"),
          "error loading tasks from storage; starting empty"
        );
        Vec::new()
      }
    }
  }

  #[tracing::instrument(skip(self, tasks), fields(key = %self.key, count = tasks.len()))]
  pub fn save(
    &mut self,
    tasks: &[Task]
  ) {
    if let Err(err) =
      self.try_save(tasks)
    {
      error!(
        error = %format!("{err:#}"),
        "error saving tasks to storage"
      );
    }
  }

  fn try_load(
    &self
  ) -> anyhow::Result<Vec<Task>> {
    let Some(raw) = self
      .storage
      .get_item(&self.key)
      .context(
        "failed reading task blob"
      )?
    else {
      return Ok(Vec::new());
    };
    decode_tasks(&raw)
  }

  fn try_save(
    &mut self,
    tasks: &[Task]
  ) -> anyhow::Result<()> {
    let serialized =
      encode_tasks(tasks)?;
    self
      .storage
      .set_item(&self.key, &serialized)
      .context(
        "failed writing task blob"
      )
  }
}

pub fn decode_tasks(
  raw: &str
) -> anyhow::Result<Vec<Task>> {
  if raw.trim().is_empty() {
    return Ok(Vec::new());
  }

  let tasks: Vec<Task> =
    serde_json::from_str(raw)
      .context(
        "failed parsing task blob"
      )?;

  let before = tasks.len();
  let kept: Vec<Task> = tasks
    .into_iter()
    .filter(|task| {
      !task.title.trim().is_empty()
    })
    .collect();
  if kept.len() != before {
    warn!(
      dropped = before - kept.len(),
      "dropped stored tasks with blank titles"
    );
  }
  Ok(kept)
}

pub fn encode_tasks(
  tasks: &[Task]
) -> anyhow::Result<String> {
  serde_json::to_string(tasks)
    .context("failed serializing tasks")
}
