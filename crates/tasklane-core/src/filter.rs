use chrono::{
  DateTime,
  Days,
  NaiveDate,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

use crate::classify::DateClassifier;
use crate::datetime::start_of_week;
use crate::task::{
  Priority,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum DateRange {
  Today,
  Tomorrow,
  #[serde(rename = "This Week")]
  ThisWeek,
  #[serde(rename = "Next Week")]
  NextWeek
}

/// Session filter selection. Every field is optional; an absent field
/// places no constraint.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:   Option<Priority>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub label:      Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub date_range: Option<DateRange>
}

impl FilterOptions {
  #[must_use]
  pub fn is_active(&self) -> bool {
    self.priority.is_some()
      || self.label.is_some()
      || self.date_range.is_some()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pred {
  PriorityEq(Priority),
  HasLabel(String),
  /// Local due date within `[start, end)`.
  DueWithin {
    start: NaiveDate,
    end:   NaiveDate
  }
}

/// Filter options resolved against a fixed "now"; all predicates must
/// hold.
#[derive(Debug, Clone)]
pub struct Filter {
  preds:      Vec<Pred>,
  classifier: DateClassifier
}

impl Filter {
  #[tracing::instrument(skip(
    classifier, now
  ))]
  pub fn compile(
    options: &FilterOptions,
    classifier: &DateClassifier,
    now: DateTime<Utc>
  ) -> Self {
    let mut preds = Vec::new();

    if let Some(priority) =
      options.priority
    {
      preds
        .push(Pred::PriorityEq(priority));
    }

    if let Some(label) = &options.label
    {
      preds.push(Pred::HasLabel(
        label.clone()
      ));
    }

    if let Some(range) =
      options.date_range
    {
      let (start, end) = range_bounds(
        range,
        classifier,
        now
      );
      preds.push(Pred::DueWithin {
        start,
        end
      });
    }

    Self {
      preds,
      classifier: *classifier
    }
  }

  #[must_use]
  pub fn predicates(&self) -> &[Pred] {
    &self.preds
  }

  #[must_use]
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    self.preds.iter().all(|pred| {
      eval_pred(
        pred,
        task,
        &self.classifier
      )
    })
  }
}

fn range_bounds(
  range: DateRange,
  classifier: &DateClassifier,
  now: DateTime<Utc>
) -> (NaiveDate, NaiveDate) {
  let today = classifier.today(now);
  let plus = |date: NaiveDate,
              days: u64|
   -> NaiveDate {
    date
      .checked_add_days(Days::new(days))
      .unwrap_or(date)
  };

  match range {
    | DateRange::Today => {
      (today, plus(today, 1))
    }
    | DateRange::Tomorrow => {
      let tomorrow = plus(today, 1);
      (tomorrow, plus(tomorrow, 1))
    }
    | DateRange::ThisWeek => {
      let start = start_of_week(
        today,
        classifier.week_start()
      );
      (start, plus(start, 7))
    }
    | DateRange::NextWeek => {
      let start = plus(
        start_of_week(
          today,
          classifier.week_start()
        ),
        7
      );
      (start, plus(start, 7))
    }
  }
}

fn eval_pred(
  pred: &Pred,
  task: &Task,
  classifier: &DateClassifier
) -> bool {
  let ok = match pred {
    | Pred::PriorityEq(priority) => {
      task.priority == *priority
    }
    | Pred::HasLabel(label) => {
      task.has_label(label)
    }
    | Pred::DueWithin {
      start,
      end
    } => task
      .due_date
      .map(|due| {
        let date =
          classifier.local_date(due);
        date >= *start && date < *end
      })
      .unwrap_or(false)
  };

  trace!(pred = ?pred, id = %task.id, ok, "filter predicate evaluation");
  ok
}
