//! Relative due-date resolution in a fixed IANA zone.

use chrono::{
	DateTime, Datelike, Days, LocalResult, Months, NaiveDate, NaiveTime, TimeZone, Weekday,
};
use chrono_tz::Tz;

/// Resolves tokens such as `tomorrow`, `in 3 days` or `next friday` against `now`.
///
/// Every result is the start of the resolved day in `now`'s zone. Unknown tokens resolve
/// to the start of today.
pub fn resolve_relative(token: &str, now: DateTime<Tz>) -> DateTime<Tz> {
	let zone = now.timezone();
	let today = now.date_naive();
	let date = resolve_date(&token.trim().to_lowercase(), today).unwrap_or(today);

	start_of_day(date, zone)
}

pub fn start_of_day(date: NaiveDate, zone: Tz) -> DateTime<Tz> {
	at_local_time(date, NaiveTime::MIN, zone)
}

pub fn end_of_day(date: NaiveDate, zone: Tz) -> DateTime<Tz> {
	let time = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);

	at_local_time(date, time, zone)
}

/// Parses a `YYYY-MM-DD` string.
pub fn parse_ymd(value: &str) -> Option<NaiveDate> {
	NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn format_ymd(value: &DateTime<Tz>) -> String {
	value.format("%Y-%m-%d").to_string()
}

fn resolve_date(token: &str, today: NaiveDate) -> Option<NaiveDate> {
	match token {
		"today" | "tonight" => return Some(today),
		"tomorrow" => return today.checked_add_days(Days::new(1)),
		"yesterday" => return today.checked_sub_days(Days::new(1)),
		"next week" => return today.checked_add_days(Days::new(7)),
		"next month" => return today.checked_add_months(Months::new(1)),
		_ => {},
	}

	if let Some(rest) = token.strip_prefix("in ") {
		let mut parts = rest.split_whitespace();
		let amount: u32 = parts.next()?.parse().ok()?;
		let unit = parts.next()?;

		if parts.next().is_some() {
			return None;
		}

		return match unit.trim_end_matches('s') {
			"day" => today.checked_add_days(Days::new(amount.into())),
			"week" => today.checked_add_days(Days::new(u64::from(amount) * 7)),
			"month" => today.checked_add_months(Months::new(amount)),
			_ => None,
		};
	}
	if let Some(day) = token.strip_prefix("next ") {
		let weekday = parse_weekday(day.trim())?;

		return Some(next_weekday(today, weekday, false));
	}

	parse_weekday(token).map(|weekday| next_weekday(today, weekday, true))
}

fn next_weekday(today: NaiveDate, weekday: Weekday, include_today: bool) -> NaiveDate {
	let current = today.weekday().num_days_from_monday();
	let target = weekday.num_days_from_monday();
	let mut ahead = (7 + target - current) % 7;

	if ahead == 0 && !include_today {
		ahead = 7;
	}

	today.checked_add_days(Days::new(ahead.into())).unwrap_or(today)
}

fn parse_weekday(value: &str) -> Option<Weekday> {
	match value {
		"monday" | "mon" => Some(Weekday::Mon),
		"tuesday" | "tue" => Some(Weekday::Tue),
		"wednesday" | "wed" => Some(Weekday::Wed),
		"thursday" | "thu" => Some(Weekday::Thu),
		"friday" | "fri" => Some(Weekday::Fri),
		"saturday" | "sat" => Some(Weekday::Sat),
		"sunday" | "sun" => Some(Weekday::Sun),
		_ => None,
	}
}

fn at_local_time(date: NaiveDate, time: NaiveTime, zone: Tz) -> DateTime<Tz> {
	let local = date.and_time(time);

	match zone.from_local_datetime(&local) {
		LocalResult::Single(value) => value,
		LocalResult::Ambiguous(earliest, _) => earliest,
		LocalResult::None => zone.from_utc_datetime(&local),
	}
}
