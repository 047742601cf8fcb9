//! Markdown checkbox parsing and rewriting.
//!
//! Every operation works on a code-stripped copy of the content to decide which lines
//! are checkboxes, then edits the original lines so code blocks stay byte-for-byte.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::markdown;

static CHECKBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\s*)- \[([ xX])\] (.+)$").expect("checkbox regex must compile")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkbox {
	/// Zero-based line index in the original content.
	pub line: usize,
	pub indent: String,
	pub checked: bool,
	pub text: String,
	pub raw_line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChecklistStats {
	pub total: usize,
	pub completed: usize,
	pub pending: usize,
	pub progress: f64,
}
impl ChecklistStats {
	pub fn is_complete(&self) -> bool {
		self.total > 0 && self.completed == self.total
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
	pub content: String,
	pub updated: bool,
	pub count: usize,
}

pub fn parse(content: &str) -> Vec<Checkbox> {
	let stripped = markdown::strip_code_blocks(content);

	stripped.split('\n').enumerate().filter_map(|(line, raw)| parse_line(line, raw)).collect()
}

pub fn stats(content: &str) -> ChecklistStats {
	let checkboxes = parse(content);
	let total = checkboxes.len();
	let completed = checkboxes.iter().filter(|checkbox| checkbox.checked).count();
	let progress = if total == 0 { 0.0 } else { 100.0 * completed as f64 / total as f64 };

	ChecklistStats { total, completed, pending: total - completed, progress }
}

/// Sets the state of every checkbox whose text contains `search`, case-insensitively.
///
/// An empty search string matches nothing.
pub fn update_one(content: &str, search: &str, checked: bool) -> UpdateOutcome {
	let needle = search.trim().to_lowercase();

	if needle.is_empty() {
		return UpdateOutcome { content: content.to_string(), updated: false, count: 0 };
	}

	let mut count = 0;
	let content = rewrite(content, checked, |checkbox| {
		let matched = checkbox.text.trim().to_lowercase().contains(&needle);

		if matched {
			count += 1;
		}

		matched
	});

	UpdateOutcome { content, updated: count > 0, count }
}

pub fn update_all(content: &str, checked: bool) -> String {
	rewrite(content, checked, |_| true)
}

pub fn is_fully_completed(content: &str) -> bool {
	stats(content).is_complete()
}

fn parse_line(line: usize, raw: &str) -> Option<Checkbox> {
	let captures = CHECKBOX_RE.captures(raw)?;
	let indent = captures.get(1)?.as_str().to_string();
	let checked = captures.get(2)?.as_str().eq_ignore_ascii_case("x");
	let text = captures.get(3)?.as_str().trim().to_string();

	Some(Checkbox { line, indent, checked, text, raw_line: raw.to_string() })
}

// Lines already in the target state are left untouched so a no-op rewrite is byte-identical.
fn rewrite(content: &str, checked: bool, mut select: impl FnMut(&Checkbox) -> bool) -> String {
	let stripped = markdown::strip_code_blocks(content);
	let mark = if checked { 'x' } else { ' ' };
	let mut lines: Vec<String> = Vec::new();

	for (index, (original, working)) in content.split('\n').zip(stripped.split('\n')).enumerate()
	{
		let Some(checkbox) = parse_line(index, working) else {
			lines.push(original.to_string());

			continue;
		};

		if !select(&checkbox) || checkbox.checked == checked {
			lines.push(original.to_string());

			continue;
		}

		match CHECKBOX_RE.captures(original) {
			Some(captures) => {
				let indent = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
				let rest = captures.get(3).map(|m| m.as_str()).unwrap_or_default();

				lines.push(format!("{indent}- [{mark}] {rest}"));
			},
			None => lines.push(original.to_string()),
		}
	}

	lines.join("\n")
}
