use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
		DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, PointsIdsList,
		Query, QueryPointsBuilder, ScrollPointsBuilder, UpsertPointsBuilder, Value,
		VectorParamsBuilder, point_id::PointIdOptions, value::Kind,
	},
};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::{Error, Result};

/// Payload fields that carry keyword indexes.
pub const KEYWORD_INDEXES: [&str; 2] = ["tags", "memo_id"];

/// Score reported for hits returned by a filter-only scroll.
pub const FILTER_MATCH_SCORE: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
	pub point_id: String,
	pub score: f32,
	pub payload: Map<String, JsonValue>,
}

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &pilot_config::Qdrant) -> Result<Self> {
		let client =
			qdrant_client::Qdrant::from_url(&cfg.url).api_key(cfg.api_key.clone()).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection and its keyword payload indexes when missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			tracing::debug!(collection = %self.collection, "Qdrant collection already exists.");

			return Ok(());
		}

		let builder = CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
			VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
		);

		self.client.create_collection(builder).await?;

		for field in KEYWORD_INDEXES {
			let request =
				CreateFieldIndexCollectionBuilder::new(&self.collection, field, FieldType::Keyword)
					.wait(true);

			self.client.create_field_index(request).await?;
		}

		tracing::info!(
			collection = %self.collection,
			vector_dim = self.vector_dim,
			"Created Qdrant collection."
		);

		Ok(())
	}

	pub async fn upsert_point(
		&self,
		id: Uuid,
		vector: Vec<f32>,
		payload: Map<String, JsonValue>,
	) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector has {} dimensions; collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let payload_map: HashMap<String, Value> =
			payload.into_iter().map(|(key, value)| (key, Value::from(value))).collect();
		let point = PointStruct::new(id.to_string(), vector, Payload::from(payload_map));
		let upsert = UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	pub async fn delete_point(&self, id: Uuid) -> Result<()> {
		let ids = PointsIdsList { ids: vec![PointId::from(id.to_string())] };
		let delete = DeletePointsBuilder::new(self.collection.clone()).points(ids).wait(true);

		self.client.delete_points(delete).await?;

		Ok(())
	}

	pub async fn query_nearest(
		&self,
		vector: Vec<f32>,
		limit: u32,
		filter: Option<Filter>,
	) -> Result<Vec<VectorHit>> {
		let mut query = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(u64::from(limit))
			.with_payload(true);

		if let Some(filter) = filter {
			query = query.filter(filter);
		}

		let response = self.client.query(query).await?;

		Ok(response
			.result
			.into_iter()
			.map(|point| VectorHit {
				point_id: point.id.as_ref().map(point_id_string).unwrap_or_default(),
				score: point.score,
				payload: payload_to_json(point.payload),
			})
			.collect())
	}

	/// Returns points matching `filter` without ranking, each scored [`FILTER_MATCH_SCORE`].
	pub async fn scroll_filtered(&self, filter: Filter, limit: u32) -> Result<Vec<VectorHit>> {
		let scroll = ScrollPointsBuilder::new(self.collection.clone())
			.filter(filter)
			.limit(limit)
			.with_payload(true);
		let response = self.client.scroll(scroll).await?;

		Ok(response
			.result
			.into_iter()
			.map(|point| VectorHit {
				point_id: point.id.as_ref().map(point_id_string).unwrap_or_default(),
				score: FILTER_MATCH_SCORE,
				payload: payload_to_json(point.payload),
			})
			.collect())
	}
}

fn point_id_string(id: &PointId) -> String {
	match &id.point_id_options {
		Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
		Some(PointIdOptions::Num(num)) => num.to_string(),
		None => String::new(),
	}
}

pub fn payload_to_json(payload: HashMap<String, Value>) -> Map<String, JsonValue> {
	payload.into_iter().map(|(key, value)| (key, value_to_json(value))).collect()
}

fn value_to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) => JsonValue::from(number),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(list)) => {
			JsonValue::Array(list.values.into_iter().map(value_to_json).collect())
		},
		Some(Kind::StructValue(object)) => JsonValue::Object(payload_to_json(object.fields)),
	}
}
