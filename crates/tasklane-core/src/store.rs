use std::collections::BTreeSet;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::calendar::{
  CalendarView,
  calendar_view
};
use crate::classify::{
  DateClassifier,
  DueClass
};
use crate::config::Config;
use crate::datetime::{
  Clock,
  SystemClock
};
use crate::filter::FilterOptions;
use crate::persistence::TaskRepository;
use crate::recurrence::next_due_date;
use crate::storage::{
  FileStorage,
  KeyValueStorage
};
use crate::task::{
  Task,
  TaskDraft,
  TaskPatch,
  normalize_title
};
use crate::view::{
  ListView,
  SortKey,
  SortOptions,
  project
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  #[default]
  List,
  Calendar
}

/// Per-session UI state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
  pub filter:      FilterOptions,
  pub sort:        SortOptions,
  pub view_mode:   ViewMode,
  pub selected:    Option<String>,
  pub editor_open: bool
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
  NotFound,
  /// One-off task, now gone from the collection.
  Removed(Task),
  /// Recurring task replaced by its next occurrence.
  Recurred {
    completed: Task,
    next:      Task
  }
}

/// Owns the task collection and the session state. Every operation that
/// changes the collection writes the whole collection back to storage
/// before returning; storage failures are logged by the repository and
/// never reach the caller.
pub struct TaskStore<S, C = SystemClock> {
  repo:       TaskRepository<S>,
  clock:      C,
  classifier: DateClassifier,
  tasks:      Vec<Task>,
  session:    Session
}

impl TaskStore<FileStorage, SystemClock> {
  /// File-backed store laid out by `cfg`, already loaded.
  #[tracing::instrument(skip(cfg))]
  pub fn open(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let data_dir =
      cfg.resolve_data_dir()?;
    let storage =
      FileStorage::open(&data_dir)?;
    let mut store = Self::from_repository(
      TaskRepository::with_key(
        storage,
        cfg.storage_key.clone()
      ),
      SystemClock
    )
    .with_classifier(cfg.classifier());
    store.load();
    Ok(store)
  }
}

impl<S, C> TaskStore<S, C>
where
  S: KeyValueStorage,
  C: Clock
{
  /// Empty store over `storage`; call [`TaskStore::load`] to read what
  /// is already stored.
  pub fn new(
    storage: S,
    clock: C
  ) -> Self {
    Self::from_repository(
      TaskRepository::new(storage),
      clock
    )
  }

  pub fn from_repository(
    repo: TaskRepository<S>,
    clock: C
  ) -> Self {
    Self {
      repo,
      clock,
      classifier: DateClassifier::default(),
      tasks: Vec::new(),
      session: Session::default()
    }
  }

  #[must_use]
  pub fn with_classifier(
    mut self,
    classifier: DateClassifier
  ) -> Self {
    self.classifier = classifier;
    self
  }

  #[tracing::instrument(skip(self))]
  pub fn load(&mut self) {
    self.tasks = self.repo.load();
    if let Some(id) =
      self.session.selected.clone()
      && self.position(&id).is_none()
    {
      self.session.selected = None;
    }
    info!(
      count = self.tasks.len(),
      "loaded task store"
    );
  }

  /// Creates a task. The title is trimmed here; a blank title is
  /// rejected and nothing changes.
  #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
  pub fn add(
    &mut self,
    draft: TaskDraft
  ) -> anyhow::Result<Task> {
    let Some(title) =
      normalize_title(&draft.title)
    else {
      warn!("rejected task with blank title");
      return Err(anyhow!(
        "task title cannot be empty"
      ));
    };

    let sort_order =
      i64::try_from(self.tasks.len())
        .unwrap_or(i64::MAX);
    let task = Task::from_draft(
      draft,
      title,
      self.clock.now(),
      sort_order
    );
    self.tasks.push(task.clone());
    self.persist();

    info!(
      id = %task.id,
      priority = task.priority.as_str(),
      sort_order,
      "added task"
    );
    Ok(task)
  }

  /// Merges `patch` into the task with `id`. Unknown ids are ignored.
  #[tracing::instrument(skip(self, patch))]
  pub fn update(
    &mut self,
    id: &str,
    patch: TaskPatch
  ) -> bool {
    let Some(idx) = self.position(id)
    else {
      debug!("update of unknown task ignored");
      return false;
    };
    if patch.is_empty() {
      debug!("empty patch; nothing to write");
      return true;
    }

    if !patch.apply(&mut self.tasks[idx])
    {
      warn!("blank title in update ignored");
    }
    self.persist();
    debug!("updated task");
    true
  }

  #[tracing::instrument(skip(self))]
  pub fn delete(
    &mut self,
    id: &str
  ) -> bool {
    let Some(idx) = self.position(id)
    else {
      debug!("delete of unknown task ignored");
      return false;
    };

    self.tasks.remove(idx);
    self.forget_selection(id);
    self.persist();
    info!("deleted task");
    true
  }

  /// Completing removes the task. A recurring task with a due date is
  /// replaced by a fresh copy due one interval later.
  #[tracing::instrument(skip(self))]
  pub fn complete(
    &mut self,
    id: &str
  ) -> Completion {
    let Some(idx) = self.position(id)
    else {
      debug!("completion of unknown task ignored");
      return Completion::NotFound;
    };

    let mut task = self.tasks.remove(idx);
    task.completed = true;

    let outcome = match task.due_date {
      | Some(due) if task.recurs() => {
        let next = task.next_occurrence(
          next_due_date(
            due,
            task.repeat,
            self.classifier.timezone()
          ),
          self.clock.now()
        );
        info!(
          next_id = %next.id,
          next_due = ?next.due_date,
          "recurring task rescheduled"
        );
        self.tasks.push(next.clone());
        Completion::Recurred {
          completed: task,
          next
        }
      }
      | _ => {
        info!("task completed");
        Completion::Removed(task)
      }
    };

    self.forget_selection(id);
    self.persist();
    outcome
  }

  /// Moves the task to `new_index` (clamped) and renumbers every
  /// `sort_order` to match position.
  #[tracing::instrument(skip(self))]
  pub fn reorder(
    &mut self,
    id: &str,
    new_index: usize
  ) -> bool {
    let Some(from) = self.position(id)
    else {
      debug!("reorder of unknown task ignored");
      return false;
    };

    let task = self.tasks.remove(from);
    let to =
      new_index.min(self.tasks.len());
    self.tasks.insert(to, task);
    for (index, task) in
      self.tasks.iter_mut().enumerate()
    {
      task.sort_order =
        i64::try_from(index)
          .unwrap_or(i64::MAX);
    }

    self.persist();
    debug!(from, to, "reordered task");
    true
  }

  /// Replaces the whole collection.
  #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
  pub fn set_tasks(
    &mut self,
    tasks: Vec<Task>
  ) {
    let before = tasks.len();
    self.tasks = tasks
      .into_iter()
      .filter(|task| {
        !task.title.trim().is_empty()
      })
      .collect();
    if self.tasks.len() != before {
      warn!(
        dropped = before - self.tasks.len(),
        "dropped tasks with blank titles"
      );
    }
    if let Some(id) =
      self.session.selected.clone()
    {
      self.forget_selection_if_missing(
        &id
      );
    }
    self.persist();
  }

  /// Writes the current collection again.
  pub fn save(&mut self) {
    self.persist();
  }

  pub fn set_filter(
    &mut self,
    filter: FilterOptions
  ) {
    debug!(?filter, "filter changed");
    self.session.filter = filter;
  }

  pub fn clear_filter(&mut self) {
    debug!("filter cleared");
    self.session.filter =
      FilterOptions::default();
  }

  pub fn set_sort(
    &mut self,
    sort: SortOptions
  ) {
    debug!(?sort, "sort changed");
    self.session.sort = sort;
  }

  /// Sort-button behaviour: same key flips direction, new key starts
  /// ascending.
  pub fn toggle_sort(
    &mut self,
    by: SortKey
  ) -> SortOptions {
    let sort =
      self.session.sort.toggled(by);
    self.set_sort(sort);
    sort
  }

  pub fn set_view_mode(
    &mut self,
    mode: ViewMode
  ) {
    self.session.view_mode = mode;
  }

  /// Selects the task with `id`, or clears the selection. Unknown ids
  /// clear it and return `false`.
  pub fn select_task(
    &mut self,
    id: Option<&str>
  ) -> bool {
    match id {
      | Some(id)
        if self.position(id).is_some() =>
      {
        self.session.selected =
          Some(id.to_string());
        true
      }
      | Some(_) => {
        self.session.selected = None;
        false
      }
      | None => {
        self.session.selected = None;
        true
      }
    }
  }

  pub fn set_editor_open(
    &mut self,
    open: bool
  ) {
    self.session.editor_open = open;
  }

  /// Opens the editor on an existing task, or on a blank draft when
  /// `id` is `None`.
  pub fn open_editor(
    &mut self,
    id: Option<&str>
  ) -> bool {
    let ok = self.select_task(id);
    self.session.editor_open = ok;
    ok
  }

  #[must_use]
  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  #[must_use]
  pub fn task(
    &self,
    id: &str
  ) -> Option<&Task> {
    self
      .tasks
      .iter()
      .find(|task| task.id == id)
  }

  #[must_use]
  pub fn filter(
    &self
  ) -> &FilterOptions {
    &self.session.filter
  }

  #[must_use]
  pub fn has_active_filter(
    &self
  ) -> bool {
    self.session.filter.is_active()
  }

  #[must_use]
  pub fn sort(&self) -> SortOptions {
    self.session.sort
  }

  #[must_use]
  pub fn view_mode(&self) -> ViewMode {
    self.session.view_mode
  }

  #[must_use]
  pub fn selected_task(
    &self
  ) -> Option<&Task> {
    self
      .session
      .selected
      .as_deref()
      .and_then(|id| self.task(id))
  }

  #[must_use]
  pub fn is_editor_open(&self) -> bool {
    self.session.editor_open
  }

  #[must_use]
  pub fn session(&self) -> &Session {
    &self.session
  }

  #[must_use]
  pub fn clock(&self) -> &C {
    &self.clock
  }

  #[must_use]
  pub fn classifier(
    &self
  ) -> &DateClassifier {
    &self.classifier
  }

  #[must_use]
  pub fn repository(
    &self
  ) -> &TaskRepository<S> {
    &self.repo
  }

  /// Distinct labels across all tasks, sorted.
  #[must_use]
  pub fn labels(&self) -> Vec<String> {
    self
      .tasks
      .iter()
      .flat_map(|task| {
        task.labels.iter().cloned()
      })
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  /// Filtered, sorted and grouped open tasks under the session's filter
  /// and sort.
  #[must_use]
  pub fn list_view(
    &self
  ) -> ListView<'_> {
    project(
      &self.tasks,
      &self.session.filter,
      self.session.sort,
      &self.classifier,
      self.clock.now()
    )
  }

  /// Month grid around `anchor`, or around today.
  #[must_use]
  pub fn calendar_view(
    &self,
    anchor: Option<NaiveDate>
  ) -> CalendarView<'_> {
    let today =
      self.classifier.today(self.clock.now());
    calendar_view(
      &self.tasks,
      anchor.unwrap_or(today),
      today,
      &self.classifier
    )
  }

  #[must_use]
  pub fn due_class(
    &self,
    task: &Task
  ) -> DueClass {
    self.classifier.classify(
      task.due_date,
      self.clock.now()
    )
  }

  #[must_use]
  pub fn due_label(
    &self,
    task: &Task
  ) -> String {
    self.classifier.format_label(
      task.due_date,
      self.clock.now()
    )
  }

  fn position(
    &self,
    id: &str
  ) -> Option<usize> {
    self
      .tasks
      .iter()
      .position(|task| task.id == id)
  }

  fn forget_selection(
    &mut self,
    id: &str
  ) {
    if self.session.selected.as_deref()
      == Some(id)
    {
      self.session.selected = None;
    }
  }

  fn forget_selection_if_missing(
    &mut self,
    id: &str
  ) {
    if self.position(id).is_none() {
      self.forget_selection(id);
    }
  }

  fn persist(&mut self) {
    self.repo.save(&self.tasks);
  }
}
