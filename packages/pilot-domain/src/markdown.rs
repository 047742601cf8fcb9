use std::sync::LazyLock;

use regex::Regex;

static INLINE_CODE_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"`[^`\n]*`").expect("inline code regex must compile"));
static TAG_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"#[A-Za-z0-9_/]+").expect("tag regex must compile"));

/// Removes fenced blocks and inline code spans while keeping the line count intact.
///
/// Fence lines and every line inside a fence become empty strings, so line `n` of the
/// result always corresponds to line `n` of the input.
pub fn strip_code_blocks(content: &str) -> String {
	let mut in_fence = false;
	let mut lines = Vec::new();

	for line in content.split('\n') {
		if is_fence(line) {
			in_fence = !in_fence;

			lines.push(String::new());

			continue;
		}
		if in_fence {
			lines.push(String::new());

			continue;
		}

		lines.push(INLINE_CODE_RE.replace_all(line, "").into_owned());
	}

	lines.join("\n")
}

/// Drops fenced blocks entirely, leaving inline code untouched.
pub fn strip_fenced_blocks(content: &str) -> String {
	let mut in_fence = false;
	let mut kept = Vec::new();

	for line in content.split('\n') {
		if is_fence(line) {
			in_fence = !in_fence;

			continue;
		}
		if !in_fence {
			kept.push(line);
		}
	}

	kept.join("\n")
}

pub fn extract_tags(content: &str) -> Vec<String> {
	let stripped = strip_code_blocks(content);
	let mut tags: Vec<String> = Vec::new();

	for found in TAG_RE.find_iter(&stripped) {
		let tag = found.as_str();

		if !tags.iter().any(|existing| existing == tag) {
			tags.push(tag.to_string());
		}
	}

	tags
}

/// Appends the `#`-prefixed `tags` missing from `content` as a final line, so server-side
/// tag parsing sees every one of them.
pub fn append_tag_line(content: &str, tags: &[String]) -> String {
	let present = extract_tags(content);
	let missing: Vec<&str> = tags
		.iter()
		.map(String::as_str)
		.filter(|tag| tag.starts_with('#') && !present.iter().any(|existing| existing == tag))
		.collect();

	if missing.is_empty() {
		return content.to_string();
	}

	format!("{}\n\n{}", content.trim_end(), missing.join(" "))
}

pub fn is_fence(line: &str) -> bool {
	line.trim_start().starts_with("```")
}
