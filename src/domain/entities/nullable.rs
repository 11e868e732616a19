//! # Nullable Column Values
//!
//! BigQuery の NULL 許容カラムに対応する値型（値 + 有効フラグ）

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// NULL 許容値
///
/// `valid == false` のとき `value` は意味を持たない（デフォルト値が入る）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Null<T> {
    pub value: T,
    pub valid: bool,
}

pub type NullString = Null<String>;
pub type NullInt64 = Null<i64>;
pub type NullFloat64 = Null<f64>;
pub type NullBool = Null<bool>;
pub type NullTimestamp = Null<DateTime<Utc>>;
pub type NullDate = Null<NaiveDate>;
pub type NullTime = Null<NaiveTime>;
pub type NullDateTime = Null<NaiveDateTime>;

impl<T> Null<T> {
    pub fn some(value: T) -> Self {
        Self { value, valid: true }
    }

    pub fn into_option(self) -> Option<T> {
        if self.valid {
            Some(self.value)
        } else {
            None
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        if self.valid {
            Some(&self.value)
        } else {
            None
        }
    }
}

impl<T: Default> Null<T> {
    pub fn null() -> Self {
        Self {
            value: T::default(),
            valid: false,
        }
    }
}

impl<T: Default> From<Option<T>> for Null<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Null::some(v),
            None => Null::null(),
        }
    }
}

impl<T> From<Null<T>> for Option<T> {
    fn from(value: Null<T>) -> Self {
        value.into_option()
    }
}

impl From<Option<i32>> for NullInt64 {
    fn from(value: Option<i32>) -> Self {
        value.map(i64::from).into()
    }
}

impl From<Option<&str>> for NullString {
    fn from(value: Option<&str>) -> Self {
        value.map(str::to_string).into()
    }
}

impl NullTimestamp {
    /// 任意のタイムゾーンの時刻から作成（UTCに正規化）
    pub fn from_time<Tz: TimeZone>(time: Option<DateTime<Tz>>) -> Self {
        time.map(|t| t.with_timezone(&Utc)).into()
    }

    /// 日付の 00:00:00 UTC として作成
    pub fn from_date(date: Option<NaiveDate>) -> Self {
        date.and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .into()
    }
}

impl NullDate {
    pub fn from_time<Tz: TimeZone>(time: Option<DateTime<Tz>>) -> Self {
        time.map(|t| t.date_naive()).into()
    }
}

impl NullTime {
    pub fn from_time<Tz: TimeZone>(time: Option<DateTime<Tz>>) -> Self {
        time.map(|t| t.time()).into()
    }
}

impl NullDateTime {
    pub fn from_time<Tz: TimeZone>(time: Option<DateTime<Tz>>) -> Self {
        time.map(|t| t.naive_local()).into()
    }
}

/// Decoding of a single result cell as returned by the query API.
///
/// Every scalar arrives as a string; TIMESTAMP arrives as epoch seconds.
pub trait FromCell: Sized {
    fn from_cell(cell: &str) -> Result<Self, String>;
}

impl FromCell for String {
    fn from_cell(cell: &str) -> Result<Self, String> {
        Ok(cell.to_string())
    }
}

impl FromCell for i64 {
    fn from_cell(cell: &str) -> Result<Self, String> {
        cell.trim()
            .parse()
            .map_err(|e| format!("invalid INT64 {:?}: {}", cell, e))
    }
}

impl FromCell for f64 {
    fn from_cell(cell: &str) -> Result<Self, String> {
        cell.trim()
            .parse()
            .map_err(|e| format!("invalid FLOAT64 {:?}: {}", cell, e))
    }
}

impl FromCell for bool {
    fn from_cell(cell: &str) -> Result<Self, String> {
        match cell.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(format!("invalid BOOL {:?}", cell)),
        }
    }
}

impl FromCell for DateTime<Utc> {
    fn from_cell(cell: &str) -> Result<Self, String> {
        let cell = cell.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Some(naive) = cell.strip_suffix(" UTC") {
            if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f") {
                return Ok(dt.and_utc());
            }
        }
        parse_epoch_seconds(cell).ok_or_else(|| format!("invalid TIMESTAMP {:?}", cell))
    }
}

impl FromCell for NaiveDate {
    fn from_cell(cell: &str) -> Result<Self, String> {
        NaiveDate::parse_from_str(cell.trim(), "%Y-%m-%d")
            .map_err(|e| format!("invalid DATE {:?}: {}", cell, e))
    }
}

impl FromCell for NaiveTime {
    fn from_cell(cell: &str) -> Result<Self, String> {
        NaiveTime::parse_from_str(cell.trim(), "%H:%M:%S%.f")
            .map_err(|e| format!("invalid TIME {:?}: {}", cell, e))
    }
}

impl FromCell for NaiveDateTime {
    fn from_cell(cell: &str) -> Result<Self, String> {
        let cell = cell.trim();
        NaiveDateTime::parse_from_str(cell, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|e| format!("invalid DATETIME {:?}: {}", cell, e))
    }
}

/// "1717236000", "1717236000.25" or "1.717236E9"
fn parse_epoch_seconds(cell: &str) -> Option<DateTime<Utc>> {
    if cell.contains(['e', 'E']) {
        let secs: f64 = cell.parse().ok()?;
        let whole = secs.floor();
        let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
        return DateTime::from_timestamp(whole as i64, nanos);
    }

    // 符号は文字列で判定する（"-0.5" の整数部は 0）
    let (negative, unsigned) = match cell.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cell),
    };
    let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() || !is_digits(whole) || !is_digits(frac) {
        return None;
    }

    let secs: i64 = whole.parse().ok()?;
    let nanos = if frac.is_empty() {
        0
    } else {
        let digits: String = frac.chars().take(9).collect();
        format!("{:0<9}", digits).parse::<u32>().ok()?
    };

    match (negative, nanos) {
        (false, _) => DateTime::from_timestamp(secs, nanos),
        (true, 0) => DateTime::from_timestamp(-secs, 0),
        (true, _) => DateTime::from_timestamp(-secs - 1, 1_000_000_000 - nanos),
    }
}

impl<T: Serialize> Serialize for Null<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.valid {
            serializer.serialize_some(&self.value)
        } else {
            serializer.serialize_none()
        }
    }
}

impl<'de, T: FromCell + Default> Deserialize<'de> for Null<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let cell = Option::<Value>::deserialize(deserializer)?;
        let text = match cell {
            None | Some(Value::Null) => return Ok(Null::null()),
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "unsupported nullable cell: {}",
                    other
                )))
            }
        };
        T::from_cell(&text).map(Null::some).map_err(de::Error::custom)
    }
}
