//! Webhook admission: source allow-list, shared-secret checks, and per-source rate limiting.

use std::{
	net::IpAddr,
	num::{NonZeroU32, NonZeroUsize},
	sync::{Mutex, PoisonError},
	time::{Duration, Instant},
};

use axum::http::HeaderMap;
use governor::{
	Quota, RateLimiter,
	clock::DefaultClock,
	state::{InMemoryState, NotKeyed},
};
use hmac::{Hmac, Mac};
use lru::LruCache;
use sha2::Sha256;

pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const GITHUB_EVENT_HEADER: &str = "x-github-event";
pub const GITLAB_TOKEN_HEADER: &str = "x-gitlab-token";
pub const GITLAB_EVENT_HEADER: &str = "x-gitlab-event";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const SIGNATURE_PREFIX: &str = "sha256=";
pub const MAX_BUCKETS: usize = 1_000;
pub const BUCKET_IDLE: Duration = Duration::from_secs(5 * 60);

type HmacSha256 = Hmac<Sha256>;
type Bucket = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
	Github,
	Gitlab,
}
impl Platform {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Github => "github",
			Self::Gitlab => "gitlab",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
	Forbidden,
	Unauthorized,
	RateLimited,
}

/// Checks an `X-Hub-Signature-256` value (`sha256=<hex>`) against the raw body.
pub fn verify_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
	let Some(signature) = header.and_then(|value| value.trim().strip_prefix(SIGNATURE_PREFIX))
	else {
		return false;
	};
	let Ok(expected) = hex::decode(signature) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
		return false;
	};

	mac.update(body);

	mac.verify_slice(&expected).is_ok()
}

pub fn sign(secret: &[u8], body: &[u8]) -> Option<String> {
	let mut mac = HmacSha256::new_from_slice(secret).ok()?;

	mac.update(body);

	Some(format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time equality for shared-secret headers.
pub fn tokens_match(expected: &str, provided: Option<&str>) -> bool {
	let Some(provided) = provided else {
		return false;
	};
	let (expected, provided) = (expected.as_bytes(), provided.as_bytes());

	if expected.len() != provided.len() {
		return false;
	}

	expected.iter().zip(provided).fold(0_u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
	let forwarded = header_str(headers, FORWARDED_FOR_HEADER)
		.and_then(|value| value.split(',').next())
		.and_then(|value| value.trim().parse::<IpAddr>().ok());

	forwarded
		.or_else(|| {
			header_str(headers, REAL_IP_HEADER).and_then(|value| value.trim().parse().ok())
		})
		.or(peer)
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllowEntry {
	Exact(IpAddr),
	Cidr { network: IpAddr, prefix: u8 },
}
impl AllowEntry {
	fn parse(raw: &str) -> Option<Self> {
		let raw = raw.trim();
		let Some((addr, prefix)) = raw.split_once('/') else {
			return raw.parse().ok().map(|ip: IpAddr| Self::Exact(ip.to_canonical()));
		};
		let network = addr.parse::<IpAddr>().ok()?.to_canonical();
		let prefix = prefix.parse::<u8>().ok()?;
		let max = if network.is_ipv4() { 32 } else { 128 };

		(prefix <= max).then_some(Self::Cidr { network, prefix })
	}

	fn contains(&self, ip: IpAddr) -> bool {
		match *self {
			Self::Exact(allowed) => allowed == ip,
			Self::Cidr { network: IpAddr::V4(network), prefix } => match ip {
				IpAddr::V4(ip) => {
					let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);

					u32::from(ip) & mask == u32::from(network) & mask
				},
				IpAddr::V6(_) => false,
			},
			Self::Cidr { network: IpAddr::V6(network), prefix } => match ip {
				IpAddr::V6(ip) => {
					let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);

					u128::from(ip) & mask == u128::from(network) & mask
				},
				IpAddr::V4(_) => false,
			},
		}
	}
}

/// Exact addresses and CIDR ranges. An empty list admits every source.
#[derive(Debug, Clone, Default)]
pub struct IpAllowList {
	entries: Vec<AllowEntry>,
}
impl IpAllowList {
	pub fn new(raw: &[String]) -> Self {
		let entries = raw
			.iter()
			.filter_map(|entry| {
				let parsed = AllowEntry::parse(entry);

				if parsed.is_none() {
					tracing::warn!(entry = %entry, "Ignoring unparseable allow-list entry.");
				}

				parsed
			})
			.collect();

		Self { entries }
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn allows(&self, ip: Option<IpAddr>) -> bool {
		if self.entries.is_empty() {
			return true;
		}

		let Some(ip) = ip.map(|ip| ip.to_canonical()) else {
			return false;
		};

		self.entries.iter().any(|entry| entry.contains(ip))
	}
}

struct SourceBucket {
	limiter: Bucket,
	last_seen: Instant,
}

/// One token bucket per source, refilled at `per_minute / 60` tokens per second.
pub struct SourceRateLimiter {
	quota: Quota,
	idle: Duration,
	buckets: Mutex<LruCache<String, SourceBucket>>,
}
impl SourceRateLimiter {
	pub fn per_minute(per_minute: u32) -> Self {
		let rate = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
		let burst = NonZeroU32::new(per_minute / 10).unwrap_or(NonZeroU32::MIN);
		let capacity = NonZeroUsize::new(MAX_BUCKETS).unwrap_or(NonZeroUsize::MIN);

		Self {
			quota: Quota::per_minute(rate).allow_burst(burst),
			idle: BUCKET_IDLE,
			buckets: Mutex::new(LruCache::new(capacity)),
		}
	}

	pub fn with_idle(mut self, idle: Duration) -> Self {
		self.idle = idle;

		self
	}

	/// Takes one token from the source's bucket. Returns `false` when it is empty.
	pub fn check(&self, source: &str) -> bool {
		let now = Instant::now();
		let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

		while let Some((_, bucket)) = buckets.peek_lru() {
			if now.duration_since(bucket.last_seen) < self.idle {
				break;
			}

			buckets.pop_lru();
		}

		if !buckets.contains(source) {
			buckets.put(
				source.to_string(),
				SourceBucket { limiter: RateLimiter::direct(self.quota), last_seen: now },
			);
		}

		let Some(bucket) = buckets.get_mut(source) else {
			return true;
		};

		bucket.last_seen = now;

		bucket.limiter.check().is_ok()
	}

	pub fn len(&self) -> usize {
		self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

pub struct WebhookGuard {
	secret: String,
	allow_list: IpAllowList,
	limiter: SourceRateLimiter,
}
impl WebhookGuard {
	pub fn new(secret: String, allow_list: IpAllowList, limiter: SourceRateLimiter) -> Self {
		Self { secret, allow_list, limiter }
	}

	pub fn from_config(cfg: &pilot_config::Webhooks) -> Self {
		Self::new(
			cfg.secret.clone(),
			IpAllowList::new(&cfg.ip_allow_list),
			SourceRateLimiter::per_minute(cfg.rate_limit_per_minute),
		)
	}

	/// Allow-list, then authenticity, then the source's rate budget.
	pub fn admit(
		&self,
		platform: Platform,
		headers: &HeaderMap,
		peer: Option<IpAddr>,
		body: &[u8],
	) -> Result<(), Rejection> {
		let ip = client_ip(headers, peer);

		if !self.allow_list.allows(ip) {
			tracing::warn!(platform = platform.as_str(), ?ip, "Webhook source is not allowed.");

			return Err(Rejection::Forbidden);
		}

		let authentic = match platform {
			Platform::Github => verify_signature(
				self.secret.as_bytes(),
				body,
				header_str(headers, GITHUB_SIGNATURE_HEADER),
			),
			Platform::Gitlab =>
				tokens_match(&self.secret, header_str(headers, GITLAB_TOKEN_HEADER)),
		};

		if !authentic {
			tracing::warn!(platform = platform.as_str(), ?ip, "Webhook failed authentication.");

			return Err(Rejection::Unauthorized);
		}

		let source = match ip {
			Some(ip) => format!("{}:{ip}", platform.as_str()),
			None => platform.as_str().to_string(),
		};

		if !self.limiter.check(&source) {
			tracing::warn!(source = %source, "Webhook source is rate limited.");

			return Err(Rejection::RateLimited);
		}

		Ok(())
	}
}
