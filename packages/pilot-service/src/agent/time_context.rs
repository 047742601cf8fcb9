use chrono::{DateTime, Datelike, Duration};
use chrono_tz::Tz;

/// Describes today, the current Monday to Sunday week and tomorrow in `now`'s zone.
pub fn time_context(now: DateTime<Tz>) -> String {
	let today = now.date_naive();
	let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
	let sunday = monday + Duration::days(6);
	let tomorrow = today + Duration::days(1);
	let day =
		|date: chrono::NaiveDate| format!("{} ({})", date.format("%Y-%m-%d"), date.format("%A"));

	format!(
		"Current time context ({zone}):\n- Today: {today}\n- This week: {monday} to {sunday}\n- Tomorrow: {tomorrow}\n- Now: {time}",
		zone = now.timezone().name(),
		today = day(today),
		monday = day(monday),
		sunday = day(sunday),
		tomorrow = day(tomorrow),
		time = now.format("%H:%M"),
	)
}
