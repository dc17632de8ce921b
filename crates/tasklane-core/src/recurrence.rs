use chrono::{
  DateTime,
  Days,
  Months,
  NaiveDateTime,
  TimeDelta,
  Utc
};
use chrono_tz::Tz;
use tracing::warn;

use crate::task::Repeat;

/// Next due date of a recurring task.
///
/// Steps are taken on the wall-clock time in `tz`, so the local day and
/// time survive DST changes. Month and year steps clamp to the last day of
/// the target month: Jan 31 + 1 month is Feb 29 in a leap year, Feb 29 +
/// 1 year is Feb 28. `Repeat::Never` returns the input unchanged.
#[must_use]
pub fn next_due_date(
  current: DateTime<Utc>,
  interval: Repeat,
  tz: &Tz
) -> DateTime<Utc> {
  let local =
    current.with_timezone(tz).naive_local();
  let next = match interval {
    | Repeat::Never => return current,
    | Repeat::Daily => {
      local.checked_add_days(Days::new(1))
    }
    | Repeat::Weekly => {
      local.checked_add_days(Days::new(7))
    }
    | Repeat::Monthly => {
      local.checked_add_months(
        Months::new(1)
      )
    }
    | Repeat::Yearly => {
      local.checked_add_months(
        Months::new(12)
      )
    }
  };

  match next
    .and_then(|naive| from_local(naive, tz))
  {
    | Some(next) => next,
    | None => {
      warn!(
        current = %current,
        ?interval,
        "recurrence step out of range; keeping due date"
      );
      current
    }
  }
}

/// Ambiguous times take the earlier instant; times skipped by a DST jump
/// move forward an hour.
fn from_local(
  naive: NaiveDateTime,
  tz: &Tz
) -> Option<DateTime<Utc>> {
  naive
    .and_local_timezone(*tz)
    .earliest()
    .or_else(|| {
      naive
        .checked_add_signed(
          TimeDelta::hours(1)
        )?
        .and_local_timezone(*tz)
        .earliest()
    })
    .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::*;

  fn at(
    y: i32,
    m: u32,
    d: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(y, m, d, 9, 30, 0)
      .unwrap()
  }

  fn utc_step(
    current: DateTime<Utc>,
    interval: Repeat
  ) -> DateTime<Utc> {
    next_due_date(
      current,
      interval,
      &chrono_tz::UTC
    )
  }

  #[test]
  fn steps_by_interval() {
    let start = at(2024, 1, 1);
    assert_eq!(
      utc_step(start, Repeat::Daily),
      at(2024, 1, 2)
    );
    assert_eq!(
      utc_step(start, Repeat::Weekly),
      at(2024, 1, 8)
    );
    assert_eq!(
      utc_step(start, Repeat::Monthly),
      at(2024, 2, 1)
    );
    assert_eq!(
      utc_step(start, Repeat::Yearly),
      at(2025, 1, 1)
    );
    assert_eq!(
      utc_step(start, Repeat::Never),
      start
    );
  }

  #[test]
  fn month_end_clamps() {
    assert_eq!(
      utc_step(
        at(2024, 1, 31),
        Repeat::Monthly
      ),
      at(2024, 2, 29)
    );
    assert_eq!(
      utc_step(
        at(2023, 1, 31),
        Repeat::Monthly
      ),
      at(2023, 2, 28)
    );
    assert_eq!(
      utc_step(
        at(2024, 2, 29),
        Repeat::Yearly
      ),
      at(2025, 2, 28)
    );
  }

  #[test]
  fn weekly_crosses_year_boundary() {
    assert_eq!(
      utc_step(
        at(2023, 12, 28),
        Repeat::Weekly
      ),
      at(2024, 1, 4)
    );
  }

  #[test]
  fn monthly_steps_the_local_calendar() {
    let tz = chrono_tz::America::New_York;
    // Jan 30 23:00 in New York is already Jan 31 in UTC.
    let due = tz
      .with_ymd_and_hms(
        2024, 1, 30, 23, 0, 0
      )
      .unwrap()
      .with_timezone(&Utc);
    let next = next_due_date(
      due,
      Repeat::Monthly,
      &tz
    );
    assert_eq!(
      next.with_timezone(&tz),
      tz.with_ymd_and_hms(
        2024, 2, 29, 23, 0, 0
      )
      .unwrap()
    );
  }

  #[test]
  fn daily_keeps_wall_clock_across_dst() {
    let tz = chrono_tz::America::New_York;
    let due = tz
      .with_ymd_and_hms(
        2024, 3, 9, 9, 0, 0
      )
      .unwrap()
      .with_timezone(&Utc);
    let next = next_due_date(
      due,
      Repeat::Daily,
      &tz
    );
    assert_eq!(
      next.with_timezone(&tz),
      tz.with_ymd_and_hms(
        2024, 3, 10, 9, 0, 0
      )
      .unwrap()
    );
    assert_eq!(next - due, TimeDelta::hours(23));
  }

  #[test]
  fn skipped_local_time_moves_forward() {
    let tz = chrono_tz::America::New_York;
    // 02:30 does not exist on 2024-03-10.
    let due = tz
      .with_ymd_and_hms(
        2024, 3, 9, 2, 30, 0
      )
      .unwrap()
      .with_timezone(&Utc);
    let next = next_due_date(
      due,
      Repeat::Daily,
      &tz
    );
    assert_eq!(
      next.with_timezone(&tz),
      tz.with_ymd_and_hms(
        2024, 3, 10, 3, 30, 0
      )
      .unwrap()
    );
  }
}
