use std::cmp::Ordering;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

use crate::classify::{
  DateClassifier,
  DueGroups
};
use crate::filter::{
  Filter,
  FilterOptions
};
use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
  DueDate,
  CreatedAt,
  Priority,
  #[default]
  Manual
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc
}

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
pub struct SortOptions {
  pub by:        SortKey,
  pub direction: SortDirection
}

impl SortOptions {
  pub fn new(
    by: SortKey,
    direction: SortDirection
  ) -> Self {
    Self {
      by,
      direction
    }
  }

  /// Selecting the active key while ascending flips to descending; any
  /// other selection starts ascending on `by`.
  #[must_use]
  pub fn toggled(
    self,
    by: SortKey
  ) -> Self {
    let direction = if self.by == by
      && self.direction
        == SortDirection::Asc
    {
      SortDirection::Desc
    } else {
      SortDirection::Asc
    };
    Self {
      by,
      direction
    }
  }
}

fn directed(
  ord: Ordering,
  direction: SortDirection
) -> Ordering {
  match direction {
    | SortDirection::Asc => ord,
    | SortDirection::Desc => {
      ord.reverse()
    }
  }
}

/// Comparator for one sort selection. Tasks without a due date go last
/// under `DueDate` whichever the direction.
#[must_use]
pub fn compare_tasks(
  a: &Task,
  b: &Task,
  sort: SortOptions
) -> Ordering {
  match sort.by {
    | SortKey::DueDate => {
      match (a.due_date, b.due_date) {
        | (None, None) => {
          Ordering::Equal
        }
        | (None, Some(_)) => {
          Ordering::Greater
        }
        | (Some(_), None) => {
          Ordering::Less
        }
        | (Some(x), Some(y)) => {
          directed(
            x.cmp(&y),
            sort.direction
          )
        }
      }
    }
    | SortKey::Priority => directed(
      a.priority
        .rank()
        .cmp(&b.priority.rank()),
      sort.direction
    ),
    | SortKey::CreatedAt => directed(
      a.created_at.cmp(&b.created_at),
      sort.direction
    ),
    | SortKey::Manual => directed(
      a.sort_order.cmp(&b.sort_order),
      sort.direction
    )
  }
}

/// Stable in-place sort; equal keys keep their input order in both
/// directions.
pub fn sort_tasks(
  tasks: &mut [&Task],
  sort: SortOptions
) {
  tasks.sort_by(|a, b| {
    compare_tasks(a, b, sort)
  });
}

/// Open tasks after filtering and sorting, plus the same sequence split
/// into due-date sections.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView<'a> {
  pub tasks:  Vec<&'a Task>,
  pub groups: DueGroups<'a>
}

/// Full list projection: drop completed tasks, apply the filter, sort,
/// then group by due date.
#[tracing::instrument(skip(
  tasks, classifier, now
), fields(total = tasks.len()))]
pub fn project<'a>(
  tasks: &'a [Task],
  filter: &FilterOptions,
  sort: SortOptions,
  classifier: &DateClassifier,
  now: DateTime<Utc>
) -> ListView<'a> {
  let compiled = Filter::compile(
    filter, classifier, now
  );
  let mut visible: Vec<&Task> = tasks
    .iter()
    .filter(|task| !task.completed)
    .filter(|task| {
      compiled.matches(task)
    })
    .collect();
  sort_tasks(&mut visible, sort);

  let groups = classifier
    .group_by_due_date(
      visible.iter().copied(),
      now
    );

  tracing::debug!(
    visible = visible.len(),
    "projected task list"
  );

  ListView {
    tasks: visible,
    groups
  }
}
