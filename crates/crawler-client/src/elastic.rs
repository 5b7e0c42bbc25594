//! Elasticsearch client over the REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crawler_bulk::{
    BulkError, BulkFailure, BulkItemResponse, BulkOperation, BulkRequest, BulkResponse,
    BulkTransport,
};
use crawler_types::ElasticsearchSettings;

use crate::error::ClientError;
use crate::indexed::{IndexedDoc, IndexedDocuments};
use crate::operation::DocOperation;

/// Upper bound on children fetched for one directory.
const MAX_CHILDREN: usize = 10_000;

/// HTTP client for one Elasticsearch cluster.
pub struct ElasticClient {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<SecretString>,
}

impl ElasticClient {
    pub fn new(settings: &ElasticsearchSettings) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => builder.basic_auth(
                user,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => builder,
        }
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, ClientError> {
        let response = self.authed(builder).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Check the cluster is reachable and return its version number.
    pub async fn ping(&self) -> Result<String, ClientError> {
        let body = self.send_json(self.client.get(self.url("/"))).await?;
        let version = body
            .pointer("/version/number")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        info!(url = %self.base_url, version = %version, "Connected to Elasticsearch");
        Ok(version)
    }

    /// Create `index` with the crawler mapping unless it already exists.
    pub async fn ensure_index(&self, index: &str) -> Result<(), ClientError> {
        let response = self.authed(self.client.head(self.url(index))).send().await?;
        if response.status().is_success() {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }

        match self
            .send_json(self.client.put(self.url(index)).json(&index_mapping()))
            .await
        {
            Ok(_) => {
                info!(index = %index, "Created index");
                Ok(())
            }
            // Lost a creation race with another crawler
            Err(ClientError::Status { status: 400, body })
                if body.contains("resource_already_exists_exception") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Make recent writes to `index` visible to searches.
    pub async fn refresh(&self, index: &str) -> Result<(), ClientError> {
        self.send_json(self.client.post(self.url(&format!("{}/_refresh", index))))
            .await
            .map(|_| ())
    }
}

fn index_mapping() -> Value {
    let keyword = json!({"type": "keyword"});
    json!({
        "mappings": {
            "properties": {
                "content": {"type": "text"},
                "name": keyword,
                "file": {
                    "properties": {
                        "filename": keyword,
                        "extension": keyword,
                        "filesize": {"type": "long"},
                        "last_modified": {"type": "date"},
                        "indexing_date": {"type": "date"}
                    }
                },
                "path": {
                    "properties": {
                        "real": keyword,
                        "virtual": keyword,
                        "parent": keyword
                    }
                }
            }
        }
    })
}

/// Render a request in the newline-delimited `_bulk` format.
pub fn render_bulk_body(request: &BulkRequest<DocOperation>) -> Result<String, ClientError> {
    let mut body = String::new();
    for operation in request.operations() {
        let mut header = serde_json::Map::new();
        header.insert(
            operation.action().to_string(),
            json!({"_index": BulkOperation::index(operation), "_id": operation.id()}),
        );
        body.push_str(&serde_json::to_string(&header)?);
        body.push('\n');
        if let DocOperation::Index { source, .. } = operation {
            body.push_str(&serde_json::to_string(source)?);
            body.push('\n');
        }
    }
    Ok(body)
}

/// Decode a `_bulk` response body into per-operation outcomes.
///
/// The error `type` becomes the failure code and `reason` its message.
/// A delete of a missing document is not a failure.
pub fn parse_bulk_response(body: &Value) -> Result<BulkResponse, ClientError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::Parse("bulk response has no items".to_string()))?;

    let mut parsed = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let result = item
            .as_object()
            .and_then(|o| o.values().next())
            .ok_or_else(|| ClientError::Parse(format!("malformed bulk item {}", position)))?;

        let index = result.get("_index").and_then(Value::as_str).unwrap_or_default();
        let id = result.get("_id").and_then(Value::as_str).unwrap_or_default();
        let status = result
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());

        let response = match result.get("error") {
            Some(error) => {
                let message = error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                let mut failure = BulkFailure::new(message);
                if let Some(code) = error.get("type").and_then(Value::as_str) {
                    failure = failure.with_code(code);
                }
                if let Some(status) = status {
                    failure = failure.with_status(status);
                }
                BulkItemResponse::failed(position, index, id, failure)
            }
            None => BulkItemResponse::success(position, index, id),
        };
        parsed.push(response);
    }
    Ok(BulkResponse::new(parsed))
}

#[async_trait]
impl BulkTransport<DocOperation> for ElasticClient {
    async fn bulk(&self, request: &BulkRequest<DocOperation>) -> Result<BulkResponse, BulkError> {
        let body = render_bulk_body(request)?;
        let response = self
            .send_json(
                self.client
                    .post(self.url("_bulk"))
                    .header("Content-Type", "application/x-ndjson")
                    .body(body),
            )
            .await?;
        Ok(parse_bulk_response(&response)?)
    }
}

#[async_trait]
impl IndexedDocuments for ElasticClient {
    async fn children(&self, index: &str, parent: &str) -> Result<Vec<IndexedDoc>, ClientError> {
        let query = json!({
            "size": MAX_CHILDREN,
            "_source": ["name", "file.filename", "path.virtual"],
            "query": {"term": {"path.parent": parent}}
        });
        let response = match self
            .send_json(
                self.client
                    .post(self.url(&format!("{}/_search", index)))
                    .json(&query),
            )
            .await
        {
            Ok(response) => response,
            Err(ClientError::Status { status: 404, .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let hits = response
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Parse("search response has no hits".to_string()))?;
        if hits.len() >= MAX_CHILDREN {
            warn!(index = %index, parent = %parent, "Too many indexed children, some may be missed");
        }

        Ok(hits.iter().filter_map(indexed_doc).collect())
    }
}

fn indexed_doc(hit: &Value) -> Option<IndexedDoc> {
    let id = hit.get("_id")?.as_str()?.to_string();
    let source = hit.get("_source")?;
    let virtual_path = source
        .pointer("/path/virtual")
        .and_then(Value::as_str)?
        .to_string();
    let name = source
        .pointer("/file/filename")
        .or_else(|| source.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            virtual_path
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        });
    Some(IndexedDoc {
        id,
        name,
        virtual_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(url: &str) -> ElasticsearchSettings {
        ElasticsearchSettings {
            url: url.to_string(),
            ..Default::default()
        }
    }

    fn request() -> BulkRequest<DocOperation> {
        [
            DocOperation::index("docs", "1", &json!({"content": "hello"})).unwrap(),
            DocOperation::delete("docs", "2"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_render_bulk_body() {
        let body = render_bulk_body(&request()).unwrap();
        assert!(body.ends_with('\n'));

        let lines: Vec<Value> = body
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({"index": {"_index": "docs", "_id": "1"}}),
                json!({"content": "hello"}),
                json!({"delete": {"_index": "docs", "_id": "2"}}),
            ]
        );
    }

    #[test]
    fn test_parse_bulk_response_with_failures() {
        let body = json!({
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_index": "docs", "_id": "1", "status": 201}},
                {"index": {"_index": "docs", "_id": "2", "status": 429, "error": {
                    "type": "es_rejected_execution_exception",
                    "reason": "rejected execution of coordinating operation"
                }}},
                {"delete": {"_index": "docs", "_id": "3", "status": 404, "result": "not_found"}}
            ]
        });

        let response = parse_bulk_response(&body).unwrap();
        assert_eq!(response.items().len(), 3);
        assert_eq!(response.failures().count(), 1);

        let failed = &response.items()[1];
        assert_eq!(failed.position, 1);
        assert_eq!(failed.id, "2");
        assert_eq!(
            failed.failure,
            Some(
                BulkFailure::new("rejected execution of coordinating operation")
                    .with_code("es_rejected_execution_exception")
                    .with_status(429)
            )
        );
        assert!(!response.items()[2].is_failed());
    }

    #[test]
    fn test_parse_bulk_response_without_items() {
        assert!(matches!(
            parse_bulk_response(&json!({"error": "boom"})),
            Err(ClientError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_posts_ndjson() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("Content-Type", "application/x-ndjson"))
            .and(body_string_contains("\"delete\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": false,
                "items": [
                    {"index": {"_index": "docs", "_id": "1", "status": 201}},
                    {"delete": {"_index": "docs", "_id": "2", "status": 200}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasticClient::new(&settings(&server.uri())).unwrap();
        let response = client.bulk(&request()).await.unwrap();
        assert!(!response.has_failures());
    }

    #[tokio::test]
    async fn test_bulk_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = ElasticClient::new(&settings(&server.uri())).unwrap();
        let err = client.bulk(&request()).await.unwrap_err();
        assert!(matches!(err, BulkError::Transport(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn test_ping_reads_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"version": {"number": "8.15.0"}})),
            )
            .mount(&server)
            .await;

        let client = ElasticClient::new(&settings(&server.uri())).unwrap();
        assert_eq!(client.ping().await.unwrap(), "8.15.0");
    }

    #[tokio::test]
    async fn test_ensure_index_creates_missing_index() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/docs"))
            .and(body_string_contains("\"parent\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasticClient::new(&settings(&server.uri())).unwrap();
        client.ensure_index("docs").await.unwrap();
    }

    #[tokio::test]
    async fn test_children_parses_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/docs/_search"))
            .and(body_string_contains("path.parent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {"hits": [
                    {"_id": "a1", "_source": {
                        "file": {"filename": "a.txt"},
                        "path": {"virtual": "/sub/a.txt"}
                    }},
                    {"_id": "f1", "_source": {
                        "name": "nested",
                        "path": {"virtual": "/sub/nested"}
                    }}
                ]}
            })))
            .mount(&server)
            .await;

        let client = ElasticClient::new(&settings(&server.uri())).unwrap();
        let children = client.children("docs", "/sub").await.unwrap();
        assert_eq!(
            children,
            vec![
                IndexedDoc {
                    id: "a1".to_string(),
                    name: "a.txt".to_string(),
                    virtual_path: "/sub/a.txt".to_string(),
                },
                IndexedDoc {
                    id: "f1".to_string(),
                    name: "nested".to_string(),
                    virtual_path: "/sub/nested".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_children_of_missing_index_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gone/_search"))
            .respond_with(ResponseTemplate::new(404).set_body_string("index_not_found_exception"))
            .mount(&server)
            .await;

        let client = ElasticClient::new(&settings(&server.uri())).unwrap();
        assert!(client.children("gone", "/").await.unwrap().is_empty());
    }
}
