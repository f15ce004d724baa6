//! OpenSearch backend.
//!
//! Plans are rendered into the OpenSearch query DSL and sent over HTTP from
//! a private tokio runtime, so callers stay synchronous. Index properties
//! live in a companion `<index>-properties` index as a single document.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, warn};

use super::analysis::{EDGE_NGRAM_MAX, EDGE_NGRAM_MIN, MAX_TOKEN_LEN};
use super::{BulkItemStatus, BulkResult, IndexError, IndexProperties, RankedHit, Result, SearchIndex};
use crate::config::ClassificationConfig;
use crate::document::IndexRecord;
use crate::query::RetrievalPlan;
use crate::query::plan::{
    BoolClause, BoostMode, Clause, FunctionScoreClause, MatchClause, Operator, ScoreFunction,
    ScoreMode, fields,
};

const PROPERTIES_ID: &str = "1";

#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    pub base_url: String,
    pub index: String,
    pub timeout: Duration,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            index: "placefinder".to_string(),
            timeout: Duration::from_secs(7),
        }
    }
}

impl OpenSearchConfig {
    pub fn new(base_url: &str, index: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn properties_index(&self) -> String {
        format!("{}-properties", self.index)
    }
}

#[derive(Debug)]
pub struct OpenSearchIndex {
    config: OpenSearchConfig,
    client: Client,
    runtime: Runtime,
}

impl OpenSearchIndex {
    pub fn connect(config: OpenSearchConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        info!(url = %config.base_url, index = %config.index, "Connected OpenSearch gateway");
        Ok(Self {
            config,
            client,
            runtime,
        })
    }

    /// Drop and recreate the document index with the place mapping.
    #[instrument(name = "Create OpenSearch Index", skip_all, level = "info")]
    pub fn create_index(&self, classification: &ClassificationConfig) -> Result<()> {
        let index = &self.config.index;
        let (status, _) = self.request(Method::DELETE, index, None)?;
        debug!(%status, "Deleted previous index");
        self.expect_ok(Method::PUT, index, Some(index_settings(classification)))?;
        info!(index = %index, "Created index");
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url)
    }

    fn map_error(&self, error: reqwest::Error) -> IndexError {
        if error.is_timeout() {
            IndexError::Timeout(self.config.timeout)
        } else {
            IndexError::Http(error)
        }
    }

    fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let url = self.url(path);
        self.runtime.block_on(async {
            let mut request = self.client.request(method, &url);
            if let Some(body) = body {
                request = request.json(&body);
            }
            let response = request.send().await.map_err(|e| self.map_error(e))?;
            let status = response.status();
            let text = response.text().await.map_err(|e| self.map_error(e))?;
            let value = if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };
            Ok::<_, IndexError>((status, value))
        })
    }

    fn expect_ok(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let (status, value) = self.request(method, path, body)?;
        if status.is_success() {
            Ok(value)
        } else {
            Err(backend_error(status, &value))
        }
    }
}

fn backend_error(status: StatusCode, body: &Value) -> IndexError {
    IndexError::Backend {
        status: status.as_u16(),
        message: body
            .pointer("/error/reason")
            .and_then(Value::as_str)
            .map_or_else(|| body.to_string(), str::to_string),
    }
}

impl SearchIndex for OpenSearchIndex {
    #[instrument(name = "OpenSearch Search", skip_all, level = "debug", fields(limit = limit))]
    fn search(&self, plan: &RetrievalPlan, limit: usize) -> Result<Vec<RankedHit>> {
        let body = render_plan(plan, limit);
        let path = format!("{}/_search", self.config.index);
        let value = self.expect_ok(Method::POST, &path, Some(body))?;
        let hits = parse_hits(value)?;
        debug!(hits = hits.len(), "Search complete");
        Ok(hits)
    }

    fn bulk_upsert(&self, records: &[IndexRecord]) -> Result<BulkResult> {
        if records.is_empty() {
            return Ok(BulkResult::default());
        }
        let mut body = String::new();
        for record in records {
            let action = json!({"index": {"_index": self.config.index, "_id": record.id}});
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&serde_json::to_string(record)?);
            body.push('\n');
        }

        let url = self.url("_bulk");
        let (status, value) = self.runtime.block_on(async {
            let response = self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await
                .map_err(|e| self.map_error(e))?;
            let status = response.status();
            let value: Value = response.json().await.map_err(|e| self.map_error(e))?;
            Ok::<_, IndexError>((status, value))
        })?;
        if !status.is_success() {
            return Err(backend_error(status, &value));
        }
        parse_bulk_response(&value)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let path = format!("{}/_doc/{id}", self.config.index);
        let (status, value) = self.request(Method::DELETE, &path, None)?;
        match status {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(value.get("result").and_then(Value::as_str) == Some("deleted")),
            s => Err(backend_error(s, &value)),
        }
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let path = format!("{}/_doc/{id}", self.config.index);
        let (status, value) = self.request(Method::HEAD, &path, None)?;
        match status {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(backend_error(s, &value)),
        }
    }

    fn refresh(&self) -> Result<()> {
        self.expect_ok(Method::POST, &format!("{}/_refresh", self.config.index), None)?;
        Ok(())
    }

    fn load_properties(&self) -> Result<Option<IndexProperties>> {
        let path = format!("{}/_doc/{PROPERTIES_ID}", self.config.properties_index());
        let (status, value) = self.request(Method::GET, &path, None)?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(backend_error(status, &value));
        }
        match value.get("_source") {
            Some(source) => Ok(Some(serde_json::from_value(source.clone())?)),
            None => Ok(None),
        }
    }

    fn save_properties(&self, properties: &IndexProperties) -> Result<()> {
        let path = format!("{}/_doc/{PROPERTIES_ID}?refresh=true", self.config.properties_index());
        self.expect_ok(Method::PUT, &path, Some(serde_json::to_value(properties)?))?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitList,
}

#[derive(Deserialize)]
struct HitList {
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source")]
    source: IndexRecord,
}

fn parse_hits(value: Value) -> Result<Vec<RankedHit>> {
    let response: SearchResponse = serde_json::from_value(value)?;
    Ok(response
        .hits
        .hits
        .into_iter()
        .map(|hit| {
            let mut record = hit.source;
            record.id.clone_from(&hit.id);
            RankedHit {
                id: hit.id,
                score: hit.score.unwrap_or_default(),
                record,
            }
        })
        .collect())
}

fn parse_bulk_response(value: &Value) -> Result<BulkResult> {
    let items = value
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("Bulk response without items: {value}"))?;
    let items: Vec<BulkItemStatus> = items
        .iter()
        .filter_map(|item| item.as_object()?.values().next())
        .map(|result| BulkItemStatus {
            id: result.get("_id").and_then(Value::as_str).unwrap_or_default().to_string(),
            error: result.get("error").map(|e| {
                e.get("reason")
                    .and_then(Value::as_str)
                    .map_or_else(|| e.to_string(), str::to_string)
            }),
        })
        .collect();
    let failed = items.iter().filter(|i| i.error.is_some()).count();
    if failed > 0 {
        warn!(failed, total = items.len(), "Bulk request had failures");
    }
    Ok(BulkResult { items })
}

/// Request body of a plan.
pub(crate) fn render_plan(plan: &RetrievalPlan, limit: usize) -> Value {
    let mut body = json!({"query": render_clause(&plan.query), "size": limit});
    if let Some(sort) = plan.sort {
        body["sort"] = json!([{
            "_geo_distance": {
                sort.field: [sort.center.lon, sort.center.lat],
                "order": "asc",
                "unit": "km",
            }
        }]);
    }
    body
}

fn single(kind: &str, field: &str, body: Value) -> Value {
    json!({ kind: { field: body } })
}

pub(crate) fn render_clause(clause: &Clause) -> Value {
    match clause {
        Clause::MatchAll => json!({"match_all": {}}),
        Clause::Match(m) => render_match(m),
        Clause::MatchPhrase { field, query, boost } => {
            single("match_phrase", field, json!({"query": query, "boost": boost}))
        }
        Clause::Term { field, value } => single("term", field, json!(value)),
        Clause::Terms { field, values, boost } => json!({"terms": {field: values, "boost": boost}}),
        Clause::Fuzzy {
            field,
            value,
            fuzziness,
            boost,
        } => single(
            "fuzzy",
            field,
            json!({"value": value, "fuzziness": fuzziness.to_string(), "boost": boost}),
        ),
        Clause::Wildcard { field, pattern } => single("wildcard", field, json!({"value": pattern})),
        Clause::Exists { field } => json!({"exists": {"field": field}}),
        Clause::QueryString { query } => json!({"query_string": {
            "query": query,
            "default_field": fields::COLLECTOR_ALL,
            "default_operator": "AND",
        }}),
        Clause::GeoDistance {
            field,
            center,
            radius_km,
        } => json!({"geo_distance": {
            "distance": format!("{radius_km}km"),
            field: {"lat": center.lat, "lon": center.lon},
        }}),
        Clause::GeoBoundingBox { field, bbox } => single(
            "geo_bounding_box",
            field,
            json!({
                "top_left": {"lat": bbox.max_lat, "lon": bbox.min_lon},
                "bottom_right": {"lat": bbox.min_lat, "lon": bbox.max_lon},
            }),
        ),
        Clause::Bool(b) => render_bool(b),
        Clause::DisMax { queries, boost } => json!({"dis_max": {
            "queries": queries.iter().map(render_clause).collect::<Vec<_>>(),
            "boost": boost,
        }}),
        Clause::FunctionScore(fs) => render_function_score(fs),
    }
}

fn render_match(m: &MatchClause) -> Value {
    let mut body = Map::new();
    body.insert("query".into(), json!(m.query));
    body.insert("fuzziness".into(), json!(m.fuzziness.to_string()));
    body.insert("prefix_length".into(), json!(m.prefix_length));
    body.insert(
        "operator".into(),
        json!(match m.operator {
            Operator::Or => "or",
            Operator::And => "and",
        }),
    );
    if let Some(msm) = &m.minimum_should_match {
        body.insert("minimum_should_match".into(), json!(msm.to_string()));
    }
    body.insert("boost".into(), json!(m.boost));
    single("match", &m.field, Value::Object(body))
}

fn render_bool(b: &BoolClause) -> Value {
    let mut body = Map::new();
    for (occur, clauses) in [
        ("must", &b.must),
        ("should", &b.should),
        ("filter", &b.filter),
        ("must_not", &b.must_not),
    ] {
        if !clauses.is_empty() {
            body.insert(occur.into(), clauses.iter().map(render_clause).collect());
        }
    }
    if let Some(msm) = b.minimum_should_match {
        body.insert("minimum_should_match".into(), json!(msm));
    }
    if let Some(boost) = b.boost {
        body.insert("boost".into(), json!(boost));
    }
    json!({"bool": body})
}

fn render_function_score(fs: &FunctionScoreClause) -> Value {
    let functions: Vec<Value> = fs
        .functions
        .iter()
        .map(|function| match function {
            ScoreFunction::Weight { weight, filter } => {
                let mut body = json!({"weight": weight});
                if let Some(filter) = filter {
                    body["filter"] = render_clause(filter);
                }
                body
            }
            ScoreFunction::FieldValueFactor {
                field,
                factor,
                missing,
            } => json!({"field_value_factor": {"field": field, "factor": factor, "missing": missing}}),
            ScoreFunction::ExpDecay {
                field,
                origin,
                scale_km,
                offset_km,
                decay,
                weight,
            } => json!({
                "exp": {field: {
                    "origin": {"lat": origin.lat, "lon": origin.lon},
                    "scale": format!("{scale_km}km"),
                    "offset": format!("{offset_km}km"),
                    "decay": decay,
                }},
                "weight": weight,
            }),
        })
        .collect();

    json!({"function_score": {
        "query": render_clause(&fs.query),
        "functions": functions,
        "score_mode": match fs.score_mode {
            ScoreMode::Multiply => "multiply",
            ScoreMode::Sum => "sum",
        },
        "boost_mode": match fs.boost_mode {
            BoostMode::Multiply => "multiply",
            BoostMode::Sum => "sum",
            BoostMode::Replace => "replace",
        },
        "boost": fs.boost,
    }})
}

/// Settings and mapping of the document index. Collector priorities are
/// stripped at analysis time; classification terms become synonyms of their
/// `#osm.<key>.<value>` tags.
pub(crate) fn index_settings(classification: &ClassificationConfig) -> Value {
    let mut synonyms = classification.synonym_rules();
    synonyms.extend(classification.search_synonyms().iter().cloned());

    let text = json!({"type": "text", "analyzer": "index_raw", "search_analyzer": "search"});
    let keyword = json!({"type": "keyword", "normalizer": "folded"});
    json!({
        "settings": {
            "analysis": {
                "char_filter": {
                    "strip_priority": {"type": "pattern_replace", "pattern": "\\|\\d+;?", "replacement": " "},
                },
                "tokenizer": {
                    "words": {"type": "pattern", "pattern": "[^\\p{L}\\p{N}#.]+"},
                },
                "filter": {
                    "edge": {"type": "edge_ngram", "min_gram": EDGE_NGRAM_MIN, "max_gram": EDGE_NGRAM_MAX},
                    "long": {"type": "length", "max": MAX_TOKEN_LEN},
                    "classification": {"type": "synonym_graph", "synonyms": synonyms},
                },
                "normalizer": {
                    "folded": {"type": "custom", "filter": ["lowercase", "asciifolding"]},
                },
                "analyzer": {
                    "index_raw": {
                        "tokenizer": "words",
                        "char_filter": ["strip_priority"],
                        "filter": ["lowercase", "asciifolding", "long"],
                    },
                    "index_ngram": {
                        "tokenizer": "words",
                        "char_filter": ["strip_priority"],
                        "filter": ["lowercase", "asciifolding", "long", "edge"],
                    },
                    "search": {
                        "tokenizer": "words",
                        "filter": ["lowercase", "asciifolding", "long", "classification"],
                    },
                },
            },
        },
        "mappings": {
            "dynamic_templates": [
                {"extra": {"path_match": "extra.*", "mapping": keyword}},
                {"field_values": {
                    "path_match": "collector.field.*",
                    "mapping": {
                        "type": "text",
                        "analyzer": "index_raw",
                        "search_analyzer": "search",
                        "fields": {"full": keyword},
                    },
                }},
                {"address_names": {"path_match": "*.*", "match_mapping_type": "string", "mapping": {"type": "text", "index": false}}},
            ],
            "properties": {
                "collector": {"properties": {
                    "all": {
                        "type": "text",
                        "analyzer": "index_raw",
                        "search_analyzer": "search",
                        "fields": {"ngram": {"type": "text", "analyzer": "index_ngram", "search_analyzer": "search"}},
                    },
                    "name": {
                        "type": "text",
                        "analyzer": "index_raw",
                        "search_analyzer": "search",
                        "fields": {"prefix": {"type": "text", "analyzer": "index_ngram", "search_analyzer": "search"}},
                    },
                    "parent": text,
                }},
                "housenumber": {"type": "text", "analyzer": "index_raw", "search_analyzer": "search", "fields": {"full": keyword}},
                "postcode": keyword,
                "type": keyword,
                "osm_type": keyword,
                "osm_key": keyword,
                "osm_value": keyword,
                "countrycode": keyword,
                "coordinate": {"type": "geo_point"},
                "importance": {"type": "float"},
                "extent": {"type": "object", "enabled": false},
                "geometry": {"type": "object", "enabled": false},
                "categories": keyword,
            },
        },
    })
}
