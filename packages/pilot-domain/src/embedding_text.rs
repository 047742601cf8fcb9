use crate::{markdown, text};

pub const MAX_EMBEDDING_CHARS: usize = 1_000;

const MAX_SUMMARY_SENTENCES: usize = 2;

/// Builds the compact text a task is embedded from.
///
/// The result joins, one per line, the first plain line without emphasis markers, every
/// `#`-prefixed line, and the first two sentences of the remaining body.
pub fn embedding_text(content: &str) -> String {
	let stripped = markdown::strip_fenced_blocks(content);
	let lines: Vec<&str> = stripped.split('\n').map(str::trim).collect();
	let title_index = lines.iter().position(|line| !line.is_empty() && !line.starts_with('#'));
	let title = title_index.map(|index| lines[index].replace('*', "")).unwrap_or_default();
	let tag_line =
		lines.iter().filter(|line| line.starts_with('#')).copied().collect::<Vec<_>>().join(" ");
	let body_start = title_index.map(|index| index + 1).unwrap_or(lines.len());
	let body = lines[body_start..]
		.iter()
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.copied()
		.collect::<Vec<_>>()
		.join(" ");
	let summary = leading_sentences(&body, MAX_SUMMARY_SENTENCES);
	let parts: Vec<&str> = [title.trim(), tag_line.as_str(), summary.as_str()]
		.into_iter()
		.filter(|part| !part.is_empty())
		.collect();

	text::cut_chars(&parts.join("\n"), MAX_EMBEDDING_CHARS).to_string()
}

fn leading_sentences(body: &str, limit: usize) -> String {
	let mut sentences = Vec::new();
	let mut start = 0;

	for (index, ch) in body.char_indices() {
		if sentences.len() == limit {
			break;
		}
		if matches!(ch, '.' | '!' | '?') {
			let sentence = body[start..index + ch.len_utf8()].trim();

			if sentence.len() > 1 {
				sentences.push(sentence);
			}

			start = index + ch.len_utf8();
		}
	}

	if sentences.len() < limit {
		let tail = body[start..].trim();

		if !tail.is_empty() {
			sentences.push(tail);
		}
	}

	sentences.join(" ")
}
