//! HTTP vector database client.
//!
//! Speaks the Milvus-compatible `/v2/vectordb` REST surface. The underlying
//! HTTP client pools connections and is internally thread-safe, matching the
//! [`VectorClient`] contract.

use super::client::{
    CollectionSchema, FieldType, HnswParams, MemoryRow, ScoredRow, SearchRequest, VectorClient,
};
use crate::{Error, Result};
use serde_json::{Value, json};
use std::time::Duration;

/// REST client for a Milvus-compatible vector database.
pub struct HttpVectorClient {
    address: String,
    database: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpVectorClient {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a client for the given base address.
    #[must_use]
    pub fn new(address: impl Into<String>, database: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            address: address.into(),
            database,
            client,
        }
    }

    fn post(&self, path: &str, operation: &'static str, mut body: Value) -> Result<Value> {
        if let Some(database) = &self.database
            && let Some(map) = body.as_object_mut()
        {
            map.insert("dbName".to_string(), Value::String(database.clone()));
        }

        let url = format!("{}{path}", self.address.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| Error::operation(operation, e))?;

        if !response.status().is_success() {
            return Err(Error::operation(
                operation,
                format!("server error: status {}", response.status()),
            ));
        }

        let envelope: Value = response
            .json()
            .map_err(|e| Error::operation(operation, e))?;

        let code = envelope.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown backend error");
            return Err(Error::operation(operation, format!("code {code}: {message}")));
        }

        Ok(envelope.get("data").cloned().unwrap_or(Value::Null))
    }

    fn field_declaration(field: &super::FieldSchema) -> Value {
        let (data_type, params) = match &field.field_type {
            FieldType::VarChar { max_length } => (
                "VarChar",
                Some(json!({ "max_length": max_length.to_string() })),
            ),
            FieldType::Float => ("Float", None),
            FieldType::Int64 => ("Int64", None),
            FieldType::FloatVector { dim } => {
                ("FloatVector", Some(json!({ "dim": dim.to_string() })))
            },
        };

        let mut declaration = json!({
            "fieldName": field.name,
            "dataType": data_type,
            "isPrimary": field.primary_key,
        });
        if let Some(params) = params
            && let Some(map) = declaration.as_object_mut()
        {
            map.insert("elementTypeParams".to_string(), params);
        }
        declaration
    }

    fn row_from_value(value: &Value) -> MemoryRow {
        let str_field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        MemoryRow {
            id: str_field("id"),
            user_id: str_field("user_id"),
            project_id: str_field("project_id"),
            memory_type: str_field("memory_type"),
            content: str_field("content"),
            importance: value
                .get("importance")
                .and_then(Value::as_f64)
                .unwrap_or_default() as f32,
            created_at: value
                .get("created_at")
                .and_then(Value::as_i64)
                .unwrap_or_default(),
            metadata: str_field("metadata"),
            embedding: Vec::new(),
        }
    }

    fn row_to_value(row: &MemoryRow) -> Value {
        json!({
            "id": row.id,
            "user_id": row.user_id,
            "project_id": row.project_id,
            "memory_type": row.memory_type,
            "content": row.content,
            "importance": row.importance,
            "created_at": row.created_at,
            "metadata": row.metadata,
            "embedding": row.embedding,
        })
    }
}

impl VectorClient for HttpVectorClient {
    fn has_collection(&self, collection: &str) -> Result<bool> {
        let data = self.post(
            "/v2/vectordb/collections/has",
            "has_collection",
            json!({ "collectionName": collection }),
        )?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let fields: Vec<Value> = schema.fields.iter().map(Self::field_declaration).collect();
        self.post(
            "/v2/vectordb/collections/create",
            "create_collection",
            json!({
                "collectionName": schema.name,
                "schema": {
                    "description": schema.description,
                    "fields": fields,
                },
            }),
        )?;
        Ok(())
    }

    fn create_index(&self, collection: &str, field: &str, params: &HnswParams) -> Result<()> {
        self.post(
            "/v2/vectordb/indexes/create",
            "create_index",
            json!({
                "collectionName": collection,
                "indexParams": [{
                    "fieldName": field,
                    "indexName": format!("{field}_hnsw"),
                    "metricType": "COSINE",
                    "params": {
                        "index_type": "HNSW",
                        "M": params.m,
                        "efConstruction": params.ef_construction,
                    },
                }],
            }),
        )?;
        Ok(())
    }

    fn load_collection(&self, collection: &str) -> Result<()> {
        self.post(
            "/v2/vectordb/collections/load",
            "load_collection",
            json!({ "collectionName": collection }),
        )?;
        Ok(())
    }

    fn insert(&self, collection: &str, rows: &[MemoryRow]) -> Result<()> {
        let data: Vec<Value> = rows.iter().map(Self::row_to_value).collect();
        self.post(
            "/v2/vectordb/entities/insert",
            "insert",
            json!({
                "collectionName": collection,
                "data": data,
            }),
        )?;
        Ok(())
    }

    fn flush(&self, collection: &str) -> Result<()> {
        self.post(
            "/v2/vectordb/collections/flush",
            "flush",
            json!({ "collectionName": collection }),
        )?;
        Ok(())
    }

    fn delete(&self, collection: &str, filter: &str) -> Result<()> {
        self.post(
            "/v2/vectordb/entities/delete",
            "delete",
            json!({
                "collectionName": collection,
                "filter": filter,
            }),
        )?;
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[&str],
    ) -> Result<Vec<MemoryRow>> {
        let data = self.post(
            "/v2/vectordb/entities/query",
            "query",
            json!({
                "collectionName": collection,
                "filter": filter,
                "outputFields": output_fields,
            }),
        )?;
        Ok(data
            .as_array()
            .map(|rows| rows.iter().map(Self::row_from_value).collect())
            .unwrap_or_default())
    }

    fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<ScoredRow>> {
        let data = self.post(
            "/v2/vectordb/entities/search",
            "vector_search",
            json!({
                "collectionName": request.collection,
                "data": [request.vector],
                "annsField": "embedding",
                "filter": request.filter,
                "limit": request.top_k,
                "outputFields": request.output_fields,
                "searchParams": {
                    "metricType": "COSINE",
                    "params": { "ef": request.ef },
                },
            }),
        )?;

        Ok(data
            .as_array()
            .map(|hits| {
                hits.iter()
                    .map(|hit| ScoredRow {
                        row: Self::row_from_value(hit),
                        score: hit
                            .get("distance")
                            .and_then(Value::as_f64)
                            .unwrap_or_default() as f32,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn close(&self) -> Result<()> {
        // Connections are pooled by the HTTP client and dropped with it
        Ok(())
    }
}
