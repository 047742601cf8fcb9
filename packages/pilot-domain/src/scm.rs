//! Canonical source-control events and the criteria used to match them to tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ACTION_MERGED: &str = "merged";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
	Github,
	Gitlab,
	Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
	Push,
	PullRequest,
	MergeRequest,
	Issue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
	pub source: EventSource,
	pub event_type: EventType,
	pub repository: String,
	pub branch: String,
	pub commit: String,
	pub author: String,
	pub message: String,
	pub pr_number: Option<u64>,
	pub issue_number: Option<u64>,
	pub action: String,
	pub received_at: DateTime<Utc>,
}
impl WebhookEvent {
	pub fn is_merge_request(&self) -> bool {
		matches!(self.event_type, EventType::PullRequest | EventType::MergeRequest)
	}

	/// Pull and merge requests only trigger work once merged. Everything else always does.
	pub fn should_process(&self) -> bool {
		!self.is_merge_request() || self.action == ACTION_MERGED
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCriteria {
	pub tags: Vec<String>,
	pub keywords: Vec<String>,
}
impl MatchCriteria {
	pub fn from_event(event: &WebhookEvent) -> Self {
		let mut criteria = Self::default();
		let repo_name = event.repository.rsplit('/').next().unwrap_or_default().trim();

		if !repo_name.is_empty() {
			criteria.push_tag(format!("#repo/{repo_name}"));
		}
		if let Some(number) = event.pr_number {
			criteria.push_tag(format!("#pr/{number}"));
			criteria.push_keyword(format!("PR #{number}"));
			criteria.push_keyword(format!("#{number}"));
		}
		if let Some(number) = event.issue_number {
			criteria.push_tag(format!("#issue/{number}"));
			criteria.push_keyword(format!("Issue #{number}"));
			criteria.push_keyword(format!("#{number}"));
		}

		let branch = event.branch.trim();

		if !branch.is_empty() {
			criteria.push_keyword(branch.to_string());
		}

		criteria
	}

	pub fn is_empty(&self) -> bool {
		self.tags.is_empty() && self.keywords.is_empty()
	}

	pub fn keyword_query(&self) -> String {
		self.keywords.join(" OR ")
	}

	/// Case-insensitive check that `content` mentions at least one keyword.
	///
	/// A mention must end at a word boundary, so `#42` does not match `#420`.
	pub fn mentions_keyword(&self, content: &str) -> bool {
		let content = content.to_lowercase();

		self.keywords.iter().any(|keyword| mentions_word(&content, &keyword.to_lowercase()))
	}

	fn push_tag(&mut self, tag: String) {
		if !self.tags.contains(&tag) {
			self.tags.push(tag);
		}
	}

	fn push_keyword(&mut self, keyword: String) {
		if !self.keywords.contains(&keyword) {
			self.keywords.push(keyword);
		}
	}
}

fn mentions_word(haystack: &str, needle: &str) -> bool {
	if needle.is_empty() {
		return false;
	}

	haystack.match_indices(needle).any(|(start, _)| {
		haystack[start + needle.len()..].chars().next().is_none_or(|next| !is_word_char(next))
	})
}

fn is_word_char(c: char) -> bool {
	c.is_alphanumeric() || matches!(c, '_' | '-' | '/')
}

/// Parses a GitHub delivery. Unsupported event kinds such as `ping` yield `None`.
pub fn parse_github(
	event_kind: &str,
	body: &[u8],
	received_at: DateTime<Utc>,
) -> serde_json::Result<Option<WebhookEvent>> {
	let event = match event_kind {
		"push" => {
			let payload: github::Push = serde_json::from_slice(body)?;
			let head = payload.head_commit.unwrap_or_default();
			let author = first_non_empty([
				head.author.username,
				head.author.name,
				payload.pusher.name,
				payload.sender.login,
			]);

			WebhookEvent {
				source: EventSource::Github,
				event_type: EventType::Push,
				repository: payload.repository.full_name_or_name(),
				branch: strip_ref(&payload.git_ref),
				commit: first_non_empty([head.id, payload.after]),
				author,
				message: head.message,
				pr_number: None,
				issue_number: None,
				action: "push".to_string(),
				received_at,
			}
		},
		"pull_request" => {
			let payload: github::PullRequestEvent = serde_json::from_slice(body)?;
			let pull = payload.pull_request;
			let action = if payload.action == "closed" && pull.merged {
				ACTION_MERGED.to_string()
			} else {
				payload.action
			};
			let number = if pull.number > 0 { pull.number } else { payload.number };

			WebhookEvent {
				source: EventSource::Github,
				event_type: EventType::PullRequest,
				repository: payload.repository.full_name_or_name(),
				branch: strip_ref(&pull.head.git_ref),
				commit: first_non_empty([pull.merge_commit_sha.unwrap_or_default(), pull.head.sha]),
				author: first_non_empty([pull.user.login, payload.sender.login]),
				message: pull.title,
				pr_number: Some(number),
				issue_number: None,
				action,
				received_at,
			}
		},
		"issues" => {
			let payload: github::IssueEvent = serde_json::from_slice(body)?;

			WebhookEvent {
				source: EventSource::Github,
				event_type: EventType::Issue,
				repository: payload.repository.full_name_or_name(),
				branch: String::new(),
				commit: String::new(),
				author: first_non_empty([payload.issue.user.login, payload.sender.login]),
				message: payload.issue.title,
				pr_number: None,
				issue_number: Some(payload.issue.number),
				action: payload.action,
				received_at,
			}
		},
		_ => return Ok(None),
	};

	Ok(Some(event))
}

/// Parses a GitLab delivery, dispatching on the payload's `object_kind`.
pub fn parse_gitlab(
	body: &[u8],
	received_at: DateTime<Utc>,
) -> serde_json::Result<Option<WebhookEvent>> {
	let kind: gitlab::Kind = serde_json::from_slice(body)?;
	let event = match kind.object_kind.as_str() {
		"push" => {
			let payload: gitlab::Push = serde_json::from_slice(body)?;
			let last = payload.commits.into_iter().last().unwrap_or_default();

			WebhookEvent {
				source: EventSource::Gitlab,
				event_type: EventType::Push,
				repository: payload.project.path_or_name(),
				branch: strip_ref(&payload.git_ref),
				commit: first_non_empty([payload.checkout_sha.unwrap_or_default(), last.id]),
				author: first_non_empty([payload.user_username, payload.user_name]),
				message: last.message,
				pr_number: None,
				issue_number: None,
				action: "push".to_string(),
				received_at,
			}
		},
		"merge_request" => {
			let payload: gitlab::MergeRequestEvent = serde_json::from_slice(body)?;
			let attrs = payload.object_attributes;
			let action = if attrs.action == "merge" || attrs.state == "merged" {
				ACTION_MERGED.to_string()
			} else {
				attrs.action
			};

			WebhookEvent {
				source: EventSource::Gitlab,
				event_type: EventType::MergeRequest,
				repository: payload.project.path_or_name(),
				branch: strip_ref(&attrs.source_branch),
				commit: first_non_empty([
					attrs.merge_commit_sha.unwrap_or_default(),
					attrs.last_commit.id,
				]),
				author: first_non_empty([payload.user.username, payload.user.name]),
				message: attrs.title,
				pr_number: Some(attrs.iid),
				issue_number: None,
				action,
				received_at,
			}
		},
		"issue" => {
			let payload: gitlab::IssueEvent = serde_json::from_slice(body)?;
			let attrs = payload.object_attributes;

			WebhookEvent {
				source: EventSource::Gitlab,
				event_type: EventType::Issue,
				repository: payload.project.path_or_name(),
				branch: String::new(),
				commit: String::new(),
				author: first_non_empty([payload.user.username, payload.user.name]),
				message: attrs.title,
				pr_number: None,
				issue_number: Some(attrs.iid),
				action: attrs.action,
				received_at,
			}
		},
		_ => return Ok(None),
	};

	Ok(Some(event))
}

pub fn strip_ref(git_ref: &str) -> String {
	git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref).to_string()
}

fn first_non_empty<const N: usize>(candidates: [String; N]) -> String {
	candidates.into_iter().find(|value| !value.trim().is_empty()).unwrap_or_default()
}

mod github {
	use serde::Deserialize;

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Push {
		#[serde(rename = "ref")]
		pub git_ref: String,
		pub after: String,
		pub repository: Repository,
		pub head_commit: Option<Commit>,
		pub pusher: Pusher,
		pub sender: User,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct PullRequestEvent {
		pub action: String,
		pub number: u64,
		pub pull_request: PullRequest,
		pub repository: Repository,
		pub sender: User,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct PullRequest {
		pub number: u64,
		pub title: String,
		pub merged: bool,
		pub merge_commit_sha: Option<String>,
		pub head: Head,
		pub user: User,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Head {
		#[serde(rename = "ref")]
		pub git_ref: String,
		pub sha: String,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct IssueEvent {
		pub action: String,
		pub issue: Issue,
		pub repository: Repository,
		pub sender: User,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Issue {
		pub number: u64,
		pub title: String,
		pub user: User,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Repository {
		pub name: String,
		pub full_name: String,
	}
	impl Repository {
		pub fn full_name_or_name(self) -> String {
			if self.full_name.is_empty() { self.name } else { self.full_name }
		}
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Commit {
		pub id: String,
		pub message: String,
		pub author: CommitAuthor,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct CommitAuthor {
		pub name: String,
		pub username: String,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Pusher {
		pub name: String,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct User {
		pub login: String,
	}
}

mod gitlab {
	use serde::Deserialize;

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Kind {
		pub object_kind: String,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Push {
		#[serde(rename = "ref")]
		pub git_ref: String,
		pub checkout_sha: Option<String>,
		pub user_name: String,
		pub user_username: String,
		pub project: Project,
		pub commits: Vec<Commit>,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct MergeRequestEvent {
		pub user: User,
		pub project: Project,
		pub object_attributes: MergeRequestAttributes,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct MergeRequestAttributes {
		pub iid: u64,
		pub title: String,
		pub action: String,
		pub state: String,
		pub source_branch: String,
		pub merge_commit_sha: Option<String>,
		pub last_commit: Commit,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct IssueEvent {
		pub user: User,
		pub project: Project,
		pub object_attributes: IssueAttributes,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct IssueAttributes {
		pub iid: u64,
		pub title: String,
		pub action: String,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Project {
		pub name: String,
		pub path_with_namespace: String,
	}
	impl Project {
		pub fn path_or_name(self) -> String {
			if self.path_with_namespace.is_empty() { self.name } else { self.path_with_namespace }
		}
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct Commit {
		pub id: String,
		pub message: String,
	}

	#[derive(Debug, Default, Deserialize)]
	#[serde(default)]
	pub struct User {
		pub name: String,
		pub username: String,
	}
}
