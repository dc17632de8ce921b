use chrono::{
  DateTime,
  Days,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  WeekStart,
  to_local_date
};
use crate::task::Task;

/// Where a due date falls relative to today.
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
#[serde(rename_all = "lowercase")]
pub enum DueClass {
  Overdue,
  Today,
  Upcoming,
  None
}

impl DueClass {
  /// Style token for collaborators that colour by category.
  #[must_use]
  pub fn css_class(
    self
  ) -> &'static str {
    match self {
      | DueClass::Overdue => {
        "due-overdue"
      }
      | DueClass::Today => "due-today",
      | DueClass::Upcoming => {
        "due-upcoming"
      }
      | DueClass::None => "due-none"
    }
  }

  /// Section heading in the grouped list.
  #[must_use]
  pub fn group_title(
    self
  ) -> &'static str {
    match self {
      | DueClass::Overdue => "Overdue",
      | DueClass::Today => "Today",
      | DueClass::Upcoming => "Upcoming",
      | DueClass::None => "No Due Date"
    }
  }
}

/// Calendar context for due-date decisions: which timezone's days count
/// and which weekday opens a week.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateClassifier {
  tz:         Tz,
  week_start: WeekStart
}

impl Default for DateClassifier {
  fn default() -> Self {
    Self {
      tz:         chrono_tz::UTC,
      week_start: WeekStart::default()
    }
  }
}

impl DateClassifier {
  pub fn new(
    tz: Tz,
    week_start: WeekStart
  ) -> Self {
    Self {
      tz,
      week_start
    }
  }

  #[must_use]
  pub fn timezone(&self) -> &Tz {
    &self.tz
  }

  #[must_use]
  pub fn week_start(
    &self
  ) -> WeekStart {
    self.week_start
  }

  #[must_use]
  pub fn local_date(
    &self,
    dt: DateTime<Utc>
  ) -> NaiveDate {
    to_local_date(dt, &self.tz)
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    self.local_date(now)
  }

  /// Date-only comparison; time of day never matters.
  #[must_use]
  pub fn classify(
    &self,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>
  ) -> DueClass {
    let Some(due) = due else {
      return DueClass::None;
    };
    let due_date = self.local_date(due);
    let today = self.today(now);
    match due_date.cmp(&today) {
      | std::cmp::Ordering::Less => {
        DueClass::Overdue
      }
      | std::cmp::Ordering::Equal => {
        DueClass::Today
      }
      | std::cmp::Ordering::Greater => {
        DueClass::Upcoming
      }
    }
  }

  #[must_use]
  pub fn css_class(
    &self,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>
  ) -> &'static str {
    self.classify(due, now).css_class()
  }

  #[must_use]
  pub fn is_tomorrow(
    &self,
    due: DateTime<Utc>,
    now: DateTime<Utc>
  ) -> bool {
    let today = self.today(now);
    today
      .checked_add_days(Days::new(1))
      .is_some_and(|tomorrow| {
        self.local_date(due) == tomorrow
      })
  }

  /// "No due date", "Today", "Tomorrow", "Jan 5 (overdue)" or "Jan 5".
  #[must_use]
  pub fn format_label(
    &self,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>
  ) -> String {
    let Some(due_dt) = due else {
      return "No due date".to_string();
    };

    match self.classify(due, now) {
      | DueClass::Today => {
        "Today".to_string()
      }
      | _ if self
        .is_tomorrow(due_dt, now) =>
      {
        "Tomorrow".to_string()
      }
      | DueClass::Overdue => {
        format!(
          "{} (overdue)",
          self.short_date(due_dt)
        )
      }
      | _ => self.short_date(due_dt)
    }
  }

  fn short_date(
    &self,
    dt: DateTime<Utc>
  ) -> String {
    self
      .local_date(dt)
      .format("%b %-d")
      .to_string()
  }

  /// Partitions tasks into the four due buckets, keeping relative order.
  /// Completion state is not consulted.
  #[must_use]
  pub fn group_by_due_date<'a, I>(
    &self,
    tasks: I,
    now: DateTime<Utc>
  ) -> DueGroups<'a>
  where
    I: IntoIterator<Item = &'a Task>
  {
    let mut groups = DueGroups::default();
    for task in tasks {
      match self
        .classify(task.due_date, now)
      {
        | DueClass::Overdue => {
          groups.overdue.push(task)
        }
        | DueClass::Today => {
          groups.today.push(task)
        }
        | DueClass::Upcoming => {
          groups.upcoming.push(task)
        }
        | DueClass::None => {
          groups.no_due_date.push(task)
        }
      }
    }
    groups
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DueGroups<'a> {
  pub overdue:     Vec<&'a Task>,
  pub today:       Vec<&'a Task>,
  pub upcoming:    Vec<&'a Task>,
  pub no_due_date: Vec<&'a Task>
}

impl<'a> DueGroups<'a> {
  /// Sections in display order.
  #[must_use]
  pub fn sections(
    &self
  ) -> [(DueClass, &[&'a Task]); 4] {
    [
      (
        DueClass::Overdue,
        self.overdue.as_slice()
      ),
      (
        DueClass::Today,
        self.today.as_slice()
      ),
      (
        DueClass::Upcoming,
        self.upcoming.as_slice()
      ),
      (
        DueClass::None,
        self.no_due_date.as_slice()
      )
    ]
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.overdue.len()
      + self.today.len()
      + self.upcoming.len()
      + self.no_due_date.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };

  use super::*;
  use crate::task::{
    Task,
    TaskDraft
  };

  fn now() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2024, 3, 15, 14, 30, 0
      )
      .unwrap()
  }

  fn task_due(
    title: &str,
    due: Option<DateTime<Utc>>
  ) -> Task {
    let mut task = Task::from_draft(
      TaskDraft::new(title),
      title.to_string(),
      now(),
      0
    );
    task.due_date = due;
    task
  }

  #[test]
  fn start_of_today_is_today_not_overdue()
  {
    let c = DateClassifier::default();
    let start_of_today = Utc
      .with_ymd_and_hms(
        2024, 3, 15, 0, 0, 0
      )
      .unwrap();
    assert_eq!(
      c.classify(
        Some(start_of_today),
        now()
      ),
      DueClass::Today
    );
    assert_eq!(
      c.classify(
        Some(
          start_of_today
            - Duration::seconds(1)
        ),
        now()
      ),
      DueClass::Overdue
    );
    assert_eq!(
      c.classify(
        Some(now() - Duration::days(1)),
        now()
      ),
      DueClass::Overdue
    );
    assert_eq!(
      c.classify(None, now()),
      DueClass::None
    );
  }

  #[test]
  fn later_today_is_today_not_upcoming()
  {
    let c = DateClassifier::default();
    let late = Utc
      .with_ymd_and_hms(
        2024, 3, 15, 23, 59, 0
      )
      .unwrap();
    assert_eq!(
      c.classify(Some(late), now()),
      DueClass::Today
    );
    assert_eq!(
      c.classify(
        Some(late + Duration::minutes(1)),
        now()
      ),
      DueClass::Upcoming
    );
  }

  #[test]
  fn classification_follows_timezone() {
    let tokyo: Tz =
      "Asia/Tokyo".parse().unwrap();
    let c = DateClassifier::new(
      tokyo,
      WeekStart::Sunday
    );
    // 2024-03-15 14:30 UTC is 23:30 in Tokyo; 16:00 UTC is the 16th there.
    let due = Utc
      .with_ymd_and_hms(
        2024, 3, 15, 16, 0, 0
      )
      .unwrap();
    assert_eq!(
      c.classify(Some(due), now()),
      DueClass::Upcoming
    );
    assert_eq!(
      c.format_label(Some(due), now()),
      "Tomorrow"
    );
  }

  #[test]
  fn labels() {
    let c = DateClassifier::default();
    assert_eq!(
      c.format_label(None, now()),
      "No due date"
    );
    assert_eq!(
      c.format_label(Some(now()), now()),
      "Today"
    );
    assert_eq!(
      c.format_label(
        Some(now() + Duration::days(1)),
        now()
      ),
      "Tomorrow"
    );
    assert_eq!(
      c.format_label(
        Some(now() - Duration::days(10)),
        now()
      ),
      "Mar 5 (overdue)"
    );
    assert_eq!(
      c.format_label(
        Some(now() + Duration::days(20)),
        now()
      ),
      "Apr 4"
    );
  }

  #[test]
  fn css_classes() {
    let c = DateClassifier::default();
    assert_eq!(
      c.css_class(None, now()),
      "due-none"
    );
    assert_eq!(
      c.css_class(
        Some(now() - Duration::days(2)),
        now()
      ),
      "due-overdue"
    );
  }

  #[test]
  fn grouping_preserves_order_and_ignores_completion()
  {
    let c = DateClassifier::default();
    let a = task_due(
      "a",
      Some(now() + Duration::days(3))
    );
    let b = task_due("b", None);
    let c1 = task_due(
      "c",
      Some(now() - Duration::days(1))
    );
    let d = task_due(
      "d",
      Some(now() + Duration::days(1))
    );
    let mut e = task_due("e", None);
    e.completed = true;
    let f = task_due("f", Some(now()));

    let tasks =
      vec![a, b, c1, d, e, f];
    let groups =
      c.group_by_due_date(&tasks, now());

    let titles = |v: &[&Task]| {
      v.iter()
        .map(|t| t.title.clone())
        .collect::<Vec<_>>()
    };
    assert_eq!(
      titles(&groups.overdue),
      vec!["c"]
    );
    assert_eq!(
      titles(&groups.today),
      vec!["f"]
    );
    assert_eq!(
      titles(&groups.upcoming),
      vec!["a", "d"]
    );
    assert_eq!(
      titles(&groups.no_due_date),
      vec!["b", "e"]
    );
    assert_eq!(groups.len(), 6);
    let headings: Vec<&str> = groups
      .sections()
      .iter()
      .map(|(class, _)| class.group_title())
      .collect();
    assert_eq!(
      headings,
      vec![
        "Overdue",
        "Today",
        "Upcoming",
        "No Due Date"
      ]
    );
  }
}
