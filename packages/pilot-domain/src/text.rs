pub const ELISION_MARKER: &str = "...";

/// Truncates to at most `max_chars` codepoints, appending [`ELISION_MARKER`] when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => format!("{}{ELISION_MARKER}", &text[..byte_index]),
		None => text.to_string(),
	}
}

/// Cuts to at most `max_chars` codepoints without a marker.
pub fn cut_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => &text[..byte_index],
		None => text,
	}
}

/// Extracts the JSON document from an LLM reply.
///
/// A fenced block wins when present. Otherwise the slice from the first `[` or `{` to the
/// last matching closing bracket is returned. Replies with neither are returned trimmed.
pub fn sanitize_json_payload(raw: &str) -> &str {
	let trimmed = raw.trim();

	if let Some(inner) = unwrap_fence(trimmed) {
		return inner;
	}

	let Some(start) = trimmed.find(['[', '{']) else {
		return trimmed;
	};
	let close = if trimmed[start..].starts_with('[') { ']' } else { '}' };

	match trimmed.rfind(close) {
		Some(end) if end > start => &trimmed[start..=end],
		_ => trimmed,
	}
}

fn unwrap_fence(text: &str) -> Option<&str> {
	let open = text.find("```")?;
	let after_open = &text[open + 3..];
	// Skip the info string such as `json`.
	let body_start = match after_open.find('\n') {
		Some(index) => index + 1,
		None => after_open.len() - after_open.trim_start_matches(char::is_alphanumeric).len(),
	};
	let body = &after_open[body_start..];
	let close = body.find("```")?;

	Some(body[..close].trim())
}
