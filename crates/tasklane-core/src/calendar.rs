use std::collections::BTreeMap;

use chrono::{
  Datelike,
  Days,
  Months,
  NaiveDate
};

use crate::classify::DateClassifier;
use crate::datetime::{
  WeekStart,
  end_of_week,
  start_of_week
};
use crate::task::Task;

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay<'a> {
  pub date:             NaiveDate,
  pub in_current_month: bool,
  pub is_today:         bool,
  pub tasks:            Vec<&'a Task>
}

/// One month of whole weeks with the open tasks due on each day.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarView<'a> {
  pub month: NaiveDate,
  pub title: String,
  pub weekday_labels: [&'static str; 7],
  pub days:  Vec<CalendarDay<'a>>
}

/// Open tasks with a due date, keyed by local due day. Relative order
/// within a day is preserved.
#[must_use]
pub fn tasks_by_day<'a>(
  tasks: &'a [Task],
  classifier: &DateClassifier
) -> BTreeMap<NaiveDate, Vec<&'a Task>> {
  let mut out: BTreeMap<
    NaiveDate,
    Vec<&'a Task>
  > = BTreeMap::new();
  for task in tasks {
    if task.completed {
      continue;
    }
    let Some(due) = task.due_date else {
      continue;
    };
    out
      .entry(classifier.local_date(due))
      .or_default()
      .push(task);
  }
  out
}

#[must_use]
pub fn first_of_month(
  date: NaiveDate
) -> NaiveDate {
  date.with_day(1).unwrap_or(date)
}

/// First day of the month `delta` months away from `anchor`'s month.
#[must_use]
pub fn shift_month(
  anchor: NaiveDate,
  delta: i32
) -> NaiveDate {
  let first = first_of_month(anchor);
  let step =
    Months::new(delta.unsigned_abs());
  let shifted = if delta >= 0 {
    first.checked_add_months(step)
  } else {
    first.checked_sub_months(step)
  };
  shifted.unwrap_or(first)
}

/// Every date from the start of the week holding the 1st through the
/// end of the week holding the month's last day.
#[must_use]
pub fn month_days(
  anchor: NaiveDate,
  week_start: WeekStart
) -> Vec<NaiveDate> {
  let first = first_of_month(anchor);
  let last = shift_month(first, 1)
    .pred_opt()
    .unwrap_or(first);

  let start =
    start_of_week(first, week_start);
  let end =
    end_of_week(last, week_start);

  let mut days = Vec::with_capacity(42);
  let mut day = start;
  while day <= end {
    days.push(day);
    match day
      .checked_add_days(Days::new(1))
    {
      | Some(next) => day = next,
      | None => break
    }
  }
  days
}

#[must_use]
pub fn month_title(
  anchor: NaiveDate
) -> String {
  anchor.format("%B %Y").to_string()
}

/// Calendar grid for the month containing `anchor`.
#[must_use]
pub fn calendar_view<'a>(
  tasks: &'a [Task],
  anchor: NaiveDate,
  today: NaiveDate,
  classifier: &DateClassifier
) -> CalendarView<'a> {
  let month = first_of_month(anchor);
  let mut by_day =
    tasks_by_day(tasks, classifier);

  let days = month_days(
    month,
    classifier.week_start()
  )
  .into_iter()
  .map(|date| CalendarDay {
    date,
    in_current_month: date.month()
      == month.month()
      && date.year() == month.year(),
    is_today: date == today,
    tasks: by_day
      .remove(&date)
      .unwrap_or_default()
  })
  .collect();

  CalendarView {
    month,
    title: month_title(month),
    weekday_labels: classifier
      .week_start()
      .weekday_labels(),
    days
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc,
    Weekday
  };

  use super::*;
  use crate::task::TaskDraft;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .unwrap()
  }

  fn due_task(
    title: &str,
    y: i32,
    m: u32,
    d: u32
  ) -> Task {
    let mut draft =
      TaskDraft::new(title);
    draft.due_date = Some(
      Utc
        .with_ymd_and_hms(y, m, d, 15, 0, 0)
        .unwrap()
    );
    Task::from_draft(
      draft,
      title.to_string(),
      Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .unwrap(),
      0
    )
  }

  #[test]
  fn month_grid_spans_whole_weeks() {
    // February 2024 starts on a Thursday and ends on a Thursday.
    let days = month_days(
      date(2024, 2, 14),
      WeekStart::Sunday
    );
    assert_eq!(
      days.first().copied(),
      Some(date(2024, 1, 28))
    );
    assert_eq!(
      days.last().copied(),
      Some(date(2024, 3, 2))
    );
    assert_eq!(days.len() % 7, 0);
    assert_eq!(
      days[0].weekday(),
      Weekday::Sun
    );

    let monday = month_days(
      date(2024, 2, 14),
      WeekStart::Monday
    );
    assert_eq!(
      monday.first().copied(),
      Some(date(2024, 1, 29))
    );
    assert_eq!(
      monday.last().copied(),
      Some(date(2024, 3, 3))
    );
  }

  #[test]
  fn shift_month_moves_to_first_day() {
    assert_eq!(
      shift_month(date(2024, 1, 31), 1),
      date(2024, 2, 1)
    );
    assert_eq!(
      shift_month(date(2024, 1, 15), -1),
      date(2023, 12, 1)
    );
  }

  #[test]
  fn tasks_bucket_by_day_and_skip_completed()
  {
    let mut done =
      due_task("done", 2024, 2, 5);
    done.completed = true;
    let mut undated =
      due_task("undated", 2024, 2, 5);
    undated.due_date = None;
    let tasks = vec![
      due_task("a", 2024, 2, 5),
      done,
      due_task("b", 2024, 2, 5),
      undated,
      due_task("c", 2024, 2, 9),
    ];

    let buckets = tasks_by_day(
      &tasks,
      &DateClassifier::default()
    );
    assert_eq!(buckets.len(), 2);
    let feb5: Vec<&str> = buckets
      [&date(2024, 2, 5)]
      .iter()
      .map(|t| t.title.as_str())
      .collect();
    assert_eq!(feb5, vec!["a", "b"]);

    let view = calendar_view(
      &tasks,
      date(2024, 2, 20),
      date(2024, 2, 9),
      &DateClassifier::default()
    );
    assert_eq!(view.title, "February 2024");
    assert_eq!(view.weekday_labels[0], "Sun");
    let feb9 = view
      .days
      .iter()
      .find(|d| d.date == date(2024, 2, 9))
      .unwrap();
    assert!(feb9.is_today);
    assert!(feb9.in_current_month);
    assert_eq!(feb9.tasks.len(), 1);
    assert!(!view.days[0].in_current_month);
  }
}
