//! Date and time functions over 1900-system serial numbers
//!
//! Serial 1 is 1900-01-01 and serial 60 is the phantom 1900-02-29, so every
//! real date from 1900-03-01 onwards lines up with other spreadsheet programs.
//! The fractional part of a serial is the time of day.

use calcsheet_core::{CellError, Value};
use chrono::{Datelike, Local, NaiveDate, Timelike};

use super::{number_arg, number_result, Category, FunctionRegistry};

/// `num_days_from_ce` of 1899-12-30, the day before serial 1 once the phantom leap day is accounted for
const EPOCH_DAYS_FROM_CE: i32 = 693_594;
/// Serial of the phantom 1900-02-29
const PHANTOM_LEAP_DAY: i64 = 60;
const SECONDS_PER_DAY: f64 = 86_400.0;

pub(super) fn register(registry: &mut FunctionRegistry) {
    use Category::DateTime;

    registry.add("DATE", DateTime, 3, Some(3), date);
    registry.add("YEAR", DateTime, 1, Some(1), year);
    registry.add("MONTH", DateTime, 1, Some(1), month);
    registry.add("DAY", DateTime, 1, Some(1), day);
    registry.add("HOUR", DateTime, 1, Some(1), hour);
    registry.add("MINUTE", DateTime, 1, Some(1), minute);
    registry.add("SECOND", DateTime, 1, Some(1), second);
    registry.add("WEEKDAY", DateTime, 1, Some(2), weekday);

    registry.add("TODAY", DateTime, 0, Some(0), today);
    registry.add("NOW", DateTime, 0, Some(0), now);
}

/// Serial number of a calendar date
pub fn serial_from_date(date: NaiveDate) -> i64 {
    let days = (date.num_days_from_ce() - EPOCH_DAYS_FROM_CE) as i64;
    if days < PHANTOM_LEAP_DAY + 1 {
        days - 1
    } else {
        days
    }
}

/// Calendar (year, month, day) of a serial number.
///
/// Serial 0 is the nominal 1900-01-00 and serial 60 the phantom 1900-02-29;
/// negative serials have no date.
pub fn ymd_from_serial(serial: f64) -> Option<(i32, u32, u32)> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let whole = serial.floor() as i64;
    match whole {
        0 => Some((1900, 1, 0)),
        PHANTOM_LEAP_DAY => Some((1900, 2, 29)),
        _ => {
            let days = if whole < PHANTOM_LEAP_DAY { whole + 1 } else { whole };
            let ce = i32::try_from(days).ok()?.checked_add(EPOCH_DAYS_FROM_CE)?;
            let date = NaiveDate::from_num_days_from_ce_opt(ce)?;
            Some((date.year(), date.month(), date.day()))
        }
    }
}

/// Resolve a date argument: ISO `YYYY-MM-DD` text or a serial number
fn date_arg(values: &[Value]) -> Option<(i32, u32, u32)> {
    if let Some(Value::Text(s)) = values.first() {
        if let Ok(date) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            return Some((date.year(), date.month(), date.day()));
        }
    }
    ymd_from_serial(number_arg(values, 0, 0.0))
}

/// Seconds since midnight carried by the fractional part of a serial
fn time_of_day(values: &[Value]) -> Option<u32> {
    let serial = number_arg(values, 0, 0.0);
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let seconds = ((serial - serial.floor()) * SECONDS_PER_DAY).round() as u32;
    Some(seconds % SECONDS_PER_DAY as u32)
}

/// DATE - Serial from year, month, day.
///
/// Months and days outside their usual range roll over into neighbouring
/// months and years; years below 1900 are offset by 1900 and years past
/// 9999 are `#NUM!`.
pub fn date(values: &[Value]) -> Value {
    let year = number_arg(values, 0, 0.0).trunc() as i64;
    let month = number_arg(values, 1, 1.0).trunc() as i64;
    let day = number_arg(values, 2, 1.0).trunc() as i64;

    let year = match year {
        0..=1899 => year + 1900,
        1900..=9999 => year,
        _ => return Value::Error(CellError::NumError),
    };

    match normalized_date(year, month, day).map(serial_from_date) {
        Some(serial) if serial >= 0 => Value::Number(serial as f64),
        _ => Value::Error(CellError::NumError),
    }
}

/// Calendar date with month and day overflow rolled over; `None` past chrono's range
fn normalized_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    let months = year.checked_mul(12)?.checked_add(month.checked_sub(1)?)?;
    let first_of_month = NaiveDate::from_ymd_opt(
        i32::try_from(months.div_euclid(12)).ok()?,
        months.rem_euclid(12) as u32 + 1,
        1,
    )?;
    let ce = i64::from(first_of_month.num_days_from_ce()).checked_add(day.checked_sub(1)?)?;
    NaiveDate::from_num_days_from_ce_opt(i32::try_from(ce).ok()?)
}

/// TODAY - Serial of the current local date
pub fn today(_values: &[Value]) -> Value {
    Value::Number(serial_from_date(Local::now().date_naive()) as f64)
}

/// NOW - Serial of the current local date and time
pub fn now(_values: &[Value]) -> Value {
    let now = Local::now();
    let seconds = now.num_seconds_from_midnight() as f64;
    number_result(serial_from_date(now.date_naive()) as f64 + seconds / SECONDS_PER_DAY)
}

/// YEAR - Year of a date
pub fn year(values: &[Value]) -> Value {
    date_arg(values).map_or(Value::Error(CellError::NumError), |(y, _, _)| {
        Value::Number(y as f64)
    })
}

/// MONTH - Month (1-12) of a date
pub fn month(values: &[Value]) -> Value {
    date_arg(values).map_or(Value::Error(CellError::NumError), |(_, m, _)| {
        Value::Number(m as f64)
    })
}

/// DAY - Day of the month of a date
pub fn day(values: &[Value]) -> Value {
    date_arg(values).map_or(Value::Error(CellError::NumError), |(_, _, d)| {
        Value::Number(d as f64)
    })
}

/// HOUR - Hour (0-23) of a time
pub fn hour(values: &[Value]) -> Value {
    time_of_day(values).map_or(Value::Error(CellError::NumError), |s| {
        Value::Number((s / 3600) as f64)
    })
}

/// MINUTE - Minute (0-59) of a time
pub fn minute(values: &[Value]) -> Value {
    time_of_day(values).map_or(Value::Error(CellError::NumError), |s| {
        Value::Number((s % 3600 / 60) as f64)
    })
}

/// SECOND - Second (0-59) of a time
pub fn second(values: &[Value]) -> Value {
    time_of_day(values).map_or(Value::Error(CellError::NumError), |s| {
        Value::Number((s % 60) as f64)
    })
}

/// WEEKDAY - Day of the week.
///
/// Return type 1 (default) counts Sunday=1..Saturday=7, type 2 counts
/// Monday=1..Sunday=7, type 3 counts Monday=0..Sunday=6.
pub fn weekday(values: &[Value]) -> Value {
    let serial = number_arg(values, 0, 0.0);
    if !serial.is_finite() || serial < 0.0 {
        return Value::Error(CellError::NumError);
    }

    let sunday_first = (serial.floor() as i64 - 1).rem_euclid(7) + 1;
    let result = match number_arg(values, 1, 1.0).trunc() as i64 {
        1 => sunday_first,
        2 => (sunday_first + 5) % 7 + 1,
        3 => (sunday_first + 5) % 7,
        _ => return Value::Error(CellError::NumError),
    };
    Value::Number(result as f64)
}
