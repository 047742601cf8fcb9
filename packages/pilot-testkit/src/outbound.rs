use std::sync::{
	Mutex,
	atomic::{AtomicBool, Ordering},
};

use pilot_service::{BoxFuture, CalendarApi, Error, EventWindow, Messenger, Result};
use pilot_storage::calendar::{CalendarEvent, NewEvent};

use crate::lock;

#[derive(Debug, Default)]
pub struct FakeCalendar {
	created: Mutex<Vec<NewEvent>>,
	events: Mutex<Vec<CalendarEvent>>,
	windows: Mutex<Vec<EventWindow>>,
	failing: AtomicBool,
}
impl FakeCalendar {
	pub fn new() -> Self {
		Self::default()
	}

	/// Events returned by every `list_events` call.
	pub fn with_events(events: Vec<CalendarEvent>) -> Self {
		Self { events: Mutex::new(events), ..Self::default() }
	}

	pub fn created(&self) -> Vec<NewEvent> {
		lock(&self.created).clone()
	}

	pub fn windows(&self) -> Vec<EventWindow> {
		lock(&self.windows).clone()
	}

	pub fn fail(&self, fail: bool) {
		self.failing.store(fail, Ordering::SeqCst);
	}

	fn check(&self) -> Result<()> {
		if self.failing.load(Ordering::SeqCst) {
			return Err(Error::Calendar { message: "Injected failure.".to_string() });
		}

		Ok(())
	}
}

impl CalendarApi for FakeCalendar {
	fn create_event<'a>(&'a self, event: &'a NewEvent) -> BoxFuture<'a, Result<CalendarEvent>> {
		Box::pin(async move {
			self.check()?;

			let mut created = lock(&self.created);

			created.push(event.clone());

			let id = format!("evt-{}", created.len());

			Ok(CalendarEvent {
				html_link: format!("https://calendar.test/event/{id}"),
				id,
				summary: event.summary.clone(),
				start: Some(event.start_time),
				end: Some(event.end_time),
			})
		})
	}

	fn list_events<'a>(
		&'a self,
		window: &'a EventWindow,
	) -> BoxFuture<'a, Result<Vec<CalendarEvent>>> {
		Box::pin(async move {
			lock(&self.windows).push(window.clone());
			self.check()?;

			Ok(lock(&self.events).clone())
		})
	}
}

/// Messenger that records `(chat_id, text)` pairs.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
	sent: Mutex<Vec<(i64, String)>>,
}
impl RecordingMessenger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn sent(&self) -> Vec<(i64, String)> {
		lock(&self.sent).clone()
	}
}

impl Messenger for RecordingMessenger {
	fn send_message<'a>(&'a self, chat_id: i64, text: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			lock(&self.sent).push((chat_id, text.to_string()));

			Ok(())
		})
	}
}
