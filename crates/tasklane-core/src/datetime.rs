use std::cell::Cell;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Days,
  NaiveDate,
  NaiveDateTime,
  SecondsFormat,
  SubsecRound,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

pub const TIMEZONE_ENV_VAR: &str =
  "TASKLANE_TIMEZONE";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Wall-clock source. The store reads "now" only through this trait so
/// tests can pin time.
pub trait Clock {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    // Persisted timestamps carry millisecond precision; keep memory in
    // step so a reload compares equal.
    Utc::now().trunc_subsecs(3)
  }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
  now: Cell<DateTime<Utc>>
}

impl FixedClock {
  pub fn new(
    now: DateTime<Utc>
  ) -> Self {
    Self {
      now: Cell::new(now)
    }
  }

  pub fn set(
    &self,
    now: DateTime<Utc>
  ) {
    self.now.set(now);
  }

  pub fn advance(
    &self,
    by: chrono::Duration
  ) {
    self.now.set(self.now.get() + by);
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.now.get()
  }
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
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
  #[default]
  Sunday,
  Monday
}

impl WeekStart {
  #[must_use]
  pub fn weekday(self) -> Weekday {
    match self {
      | WeekStart::Sunday => {
        Weekday::Sun
      }
      | WeekStart::Monday => {
        Weekday::Mon
      }
    }
  }

  /// Short day names in column order, starting at the week start.
  #[must_use]
  pub fn weekday_labels(
    self
  ) -> [&'static str; 7] {
    match self {
      | WeekStart::Sunday => [
        "Sun", "Mon", "Tue", "Wed",
        "Thu", "Fri", "Sat"
      ],
      | WeekStart::Monday => [
        "Mon", "Tue", "Wed", "Thu",
        "Fri", "Sat", "Sun"
      ]
    }
  }
}

#[must_use]
pub fn to_local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

/// First day of the week containing `date`.
#[must_use]
pub fn start_of_week(
  date: NaiveDate,
  week_start: WeekStart
) -> NaiveDate {
  let from_idx = date
    .weekday()
    .num_days_from_monday()
    as u64;
  let start_idx = week_start
    .weekday()
    .num_days_from_monday()
    as u64;
  let back = (7 + from_idx - start_idx)
    % 7;
  date
    .checked_sub_days(Days::new(back))
    .unwrap_or(date)
}

#[must_use]
pub fn end_of_week(
  date: NaiveDate,
  week_start: WeekStart
) -> NaiveDate {
  let start =
    start_of_week(date, week_start);
  start
    .checked_add_days(Days::new(6))
    .unwrap_or(start)
}

/// Timezone whose calendar days define "today". `TASKLANE_TIMEZONE` wins
/// over the configured id; anything unparseable falls back to UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or(chrono_tz::UTC)
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// `2024-01-01T00:00:00.000Z`
#[must_use]
pub fn format_iso(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

/// Accepts RFC 3339 with any offset, a bare `YYYY-MM-DDTHH:MM[:SS]`
/// (read as UTC) or a bare `YYYY-MM-DD` (UTC midnight).
pub fn parse_iso(
  input: &str
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(ndt.and_utc());
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
    && let Some(midnight) =
      date.and_hms_opt(0, 0, 0)
  {
    return Ok(midnight.and_utc());
  }

  Err(anyhow!(
    "unrecognized ISO-8601 timestamp: \
     {input}"
  ))
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::*;

  #[test]
  fn parses_offset_and_date_only_forms()
  {
    let with_offset = parse_iso(
      "2024-01-01T02:00:00+02:00"
    )
    .expect("offset form");
    assert_eq!(
      with_offset,
      Utc
        .with_ymd_and_hms(
          2024, 1, 1, 0, 0, 0
        )
        .unwrap()
    );

    let date_only =
      parse_iso("2024-01-01")
        .expect("date-only form");
    assert_eq!(date_only, with_offset);

    assert!(
      parse_iso("next tuesday").is_err()
    );
  }

  #[test]
  fn formats_with_millis_and_z() {
    let dt = Utc
      .with_ymd_and_hms(
        2024, 1, 8, 13, 5, 0
      )
      .unwrap();
    assert_eq!(
      format_iso(dt),
      "2024-01-08T13:05:00.000Z"
    );
  }

  #[test]
  fn week_bounds_follow_week_start() {
    // Wednesday
    let date =
      NaiveDate::from_ymd_opt(
        2024, 1, 10
      )
      .unwrap();
    assert_eq!(
      start_of_week(
        date,
        WeekStart::Sunday
      ),
      NaiveDate::from_ymd_opt(
        2024, 1, 7
      )
      .unwrap()
    );
    assert_eq!(
      start_of_week(
        date,
        WeekStart::Monday
      ),
      NaiveDate::from_ymd_opt(
        2024, 1, 8
      )
      .unwrap()
    );
    assert_eq!(
      end_of_week(
        date,
        WeekStart::Monday
      ),
      NaiveDate::from_ymd_opt(
        2024, 1, 14
      )
      .unwrap()
    );
  }

  #[test]
  fn local_date_uses_timezone() {
    let dt = Utc
      .with_ymd_and_hms(
        2024, 1, 2, 3, 0, 0
      )
      .unwrap();
    let tz: Tz = "America/New_York"
      .parse()
      .unwrap();
    assert_eq!(
      to_local_date(dt, &tz),
      NaiveDate::from_ymd_opt(
        2024, 1, 1
      )
      .unwrap()
    );
  }

  #[test]
  fn fixed_clock_advances() {
    let start = Utc
      .with_ymd_and_hms(
        2024, 1, 1, 0, 0, 0
      )
      .unwrap();
    let clock = FixedClock::new(start);
    clock.advance(
      chrono::Duration::hours(5)
    );
    assert_eq!(
      clock.now(),
      start
        + chrono::Duration::hours(5)
    );
  }
}

pub mod iso_date_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_iso(*dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw)
          if raw.trim().is_empty() =>
        {
          Ok(None)
        }
        | Some(raw) => {
          super::super::parse_iso(&raw)
            .map(Some)
            .map_err(
              serde::de::Error::custom
            )
        }
        | None => Ok(None)
      }
    }
  }
}
