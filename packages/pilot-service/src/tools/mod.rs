//! Capabilities the agent may call, and the registry that exposes them.

pub mod calendar;
pub mod checklist;
pub mod search;

use std::{collections::HashMap, sync::Arc};

use serde_json::{Map, Value};

use pilot_domain::task::Scope;
use pilot_providers::ToolDeclaration;

use crate::{BoxFuture, Error, Result};

pub trait Tool
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn description(&self) -> &str;

	/// JSON schema of the arguments object.
	fn parameters(&self) -> Value;

	/// Validates `args` first. Ill-typed or missing fields return [`Error::InvalidRequest`].
	fn invoke<'a>(
		&'a self,
		scope: &'a Scope,
		args: &'a Map<String, Value>,
	) -> BoxFuture<'a, Result<Value>>;

	fn declaration(&self) -> ToolDeclaration {
		ToolDeclaration {
			name: self.name().to_string(),
			description: self.description().to_string(),
			parameters: self.parameters(),
		}
	}
}

/// Name-indexed tools, fixed once built.
#[derive(Clone, Default)]
pub struct ToolRegistry {
	tools: HashMap<String, Arc<dyn Tool>>,
	order: Vec<String>,
}
impl ToolRegistry {
	pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
		let mut registry = Self::default();

		for tool in tools {
			let name = tool.name().to_string();

			if registry.tools.contains_key(&name) {
				return Err(Error::invalid_request(format!("Tool {name} is registered twice.")));
			}

			registry.order.push(name.clone());
			registry.tools.insert(name, tool);
		}

		Ok(registry)
	}

	pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
		self.tools.get(name)
	}

	pub fn names(&self) -> &[String] {
		&self.order
	}

	pub fn declarations(&self) -> Vec<ToolDeclaration> {
		self.order
			.iter()
			.filter_map(|name| self.tools.get(name))
			.map(|tool| tool.declaration())
			.collect()
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}
}

pub(crate) fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
	match args.get(key) {
		Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.trim()),
		Some(Value::String(_)) | None => {
			Err(Error::invalid_request(format!("Missing required argument {key}.")))
		},
		Some(_) => Err(Error::invalid_request(format!("Argument {key} must be a string."))),
	}
}

pub(crate) fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>> {
	match args.get(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(value)) if value.trim().is_empty() => Ok(None),
		Some(Value::String(value)) => Ok(Some(value.trim())),
		Some(_) => Err(Error::invalid_request(format!("Argument {key} must be a string."))),
	}
}

/// Accepts integers and integral floats, since models emit both.
pub(crate) fn optional_u32(args: &Map<String, Value>, key: &str) -> Result<Option<u32>> {
	let Some(value) = args.get(key) else {
		return Ok(None);
	};

	match value {
		Value::Null => Ok(None),
		Value::Number(number) => number
			.as_u64()
			.or_else(|| number.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
			.and_then(|n| u32::try_from(n).ok())
			.map(Some)
			.ok_or_else(|| {
				Error::invalid_request(format!("Argument {key} must be a non-negative integer."))
			}),
		_ => Err(Error::invalid_request(format!("Argument {key} must be a number."))),
	}
}

/// Accepts booleans and the strings `true`/`false`.
pub(crate) fn required_bool(args: &Map<String, Value>, key: &str) -> Result<bool> {
	match args.get(key) {
		Some(Value::Bool(value)) => Ok(*value),
		Some(Value::String(value)) if value.eq_ignore_ascii_case("true") => Ok(true),
		Some(Value::String(value)) if value.eq_ignore_ascii_case("false") => Ok(false),
		None => Err(Error::invalid_request(format!("Missing required argument {key}."))),
		Some(_) => Err(Error::invalid_request(format!("Argument {key} must be a boolean."))),
	}
}
