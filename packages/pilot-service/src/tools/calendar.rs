use std::sync::Arc;

use serde_json::{Map, Value, json};

use pilot_config::DEFAULT_TIMEZONE;
use pilot_domain::{dates, task::Scope};
use pilot_storage::calendar::DEFAULT_MAX_RESULTS;

use crate::{
	BoxFuture, CalendarApi, Error, EventWindow, Result,
	tools::{self, Tool},
};

pub const NAME: &str = "check_calendar";

pub struct CheckCalendarTool {
	calendar: Arc<dyn CalendarApi>,
}
impl CheckCalendarTool {
	pub fn new(calendar: Arc<dyn CalendarApi>) -> Self {
		Self { calendar }
	}

	async fn run(&self, args: &Map<String, Value>) -> Result<Value> {
		let start_date = tools::required_str(args, "start_date")?;
		let end_date = tools::required_str(args, "end_date")?;
		let zone_name = tools::optional_str(args, "time_zone")?.unwrap_or(DEFAULT_TIMEZONE);
		let zone = zone_name
			.parse::<chrono_tz::Tz>()
			.map_err(|_| Error::invalid_request(format!("Unknown time_zone {zone_name}.")))?;
		let start = dates::parse_ymd(start_date)
			.ok_or_else(|| Error::invalid_request("start_date must be YYYY-MM-DD."))?;
		let end = dates::parse_ymd(end_date)
			.ok_or_else(|| Error::invalid_request("end_date must be YYYY-MM-DD."))?;

		if end < start {
			return Err(Error::invalid_request("end_date is before start_date."));
		}

		let window = EventWindow {
			calendar_id: None,
			time_min: dates::start_of_day(start, zone).fixed_offset(),
			time_max: dates::end_of_day(end, zone).fixed_offset(),
			max_results: DEFAULT_MAX_RESULTS,
		};

		// Calendar failures are reported in the output so the agent can keep reasoning.
		let output = match self.calendar.list_events(&window).await {
			Ok(events) => {
				let event_count = events.len();
				let summary = if event_count == 0 {
					format!("No events between {start_date} and {end_date}. The time is free.")
				} else {
					format!("{event_count} event(s) between {start_date} and {end_date}.")
				};

				json!({
					"events": events,
					"event_count": event_count,
					"has_conflict": event_count > 0,
					"summary": summary,
				})
			},
			Err(err) => {
				tracing::warn!(tool = NAME, error = %err, "Calendar lookup failed.");

				json!({
					"events": [],
					"event_count": 0,
					"has_conflict": false,
					"summary": format!("Could not read the calendar: {err}"),
				})
			},
		};

		Ok(output)
	}
}

impl Tool for CheckCalendarTool {
	fn name(&self) -> &str {
		NAME
	}

	fn description(&self) -> &str {
		"Lists calendar events between two dates (inclusive) to check availability or conflicts."
	}

	fn parameters(&self) -> Value {
		json!({
			"type": "object",
			"properties": {
				"start_date": { "type": "string", "description": "First day, YYYY-MM-DD." },
				"end_date": { "type": "string", "description": "Last day, YYYY-MM-DD." },
				"time_zone": {
					"type": "string",
					"description": format!("IANA time zone. Defaults to {DEFAULT_TIMEZONE}.")
				}
			},
			"required": ["start_date", "end_date"]
		})
	}

	fn invoke<'a>(
		&'a self,
		_scope: &'a Scope,
		args: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(self.run(args))
	}
}
