//! DataPlaneClient - Rule collections and transactions over the HAProxy Data Plane API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

use hapsync_core::client::{BoxFuture, ClientError, ClientResult, RuleCollectionClient};
use hapsync_core::rule::{CollectionScope, ObservedRule, Rule};
use hapsync_core::strategy::ApiVersion;
use hapsync_core::transaction::{
    TransactionError, TransactionId, TransactionResult, Transactions,
};

use crate::config::DataPlaneConfig;
use crate::payload::{VersionedList, observed_from_list, rule_to_json};

const USER_AGENT: &str = "hapsync";

type Query = Vec<(&'static str, String)>;

#[derive(Deserialize)]
struct TransactionBody {
    id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for one Data Plane API endpoint
pub struct DataPlaneClient {
    http: Client,
    base: Url,
    username: String,
    password: String,
    api_version: ApiVersion,
}

impl DataPlaneClient {
    pub fn new(config: &DataPlaneConfig) -> ClientResult<Self> {
        config.validate().map_err(ClientError::new)?;

        let base = Url::parse(&config.url).map_err(|e| {
            ClientError::new(format!("Invalid dataplane url '{}': {}", config.url, e)).with_cause(e)
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::new(format!(
                "Invalid dataplane url '{}'",
                config.url
            )));
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ClientError::new(format!("Failed to create HTTP client: {}", e)).with_cause(e)
            })?;

        Ok(Self {
            http,
            base,
            username: config.username.clone(),
            password: config.password.clone(),
            api_version: config.api_version,
        })
    }

    /// Versioned URL for a path below the API root
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::new(format!("Invalid dataplane url '{}'", self.base)))?
            .pop_if_empty()
            .push(self.api_version.as_str())
            .extend(segments);
        Ok(url)
    }

    fn collection_url(&self, scope: &CollectionScope, index: Option<usize>) -> ClientResult<Url> {
        let index = index.map(|i| i.to_string());
        let parent = &scope.parent;

        let mut segments = vec!["services", "haproxy", "configuration"];
        match self.api_version {
            ApiVersion::V2 => segments.push(scope.collection.as_str()),
            ApiVersion::V3 => segments.extend([
                parent.parent_type.plural(),
                parent.name.as_str(),
                scope.collection.as_str(),
            ]),
        }
        if let Some(index) = index.as_deref() {
            segments.push(index);
        }
        self.endpoint(&segments)
    }

    /// v2 addresses the parent through query parameters
    fn parent_query(&self, scope: &CollectionScope) -> Query {
        match self.api_version {
            ApiVersion::V2 => vec![
                ("parent_type", scope.parent.parent_type.as_str().to_string()),
                ("parent_name", scope.parent.name.clone()),
            ],
            ApiVersion::V3 => Vec::new(),
        }
    }

    /// Parameters of a write: the scope's transaction, or the current version
    async fn write_query(&self, scope: &CollectionScope) -> ClientResult<Query> {
        let mut query = self.parent_query(scope);
        match &scope.transaction {
            Some(id) => query.push(("transaction_id", id.to_string())),
            None => query.push(("version", self.configuration_version().await?.to_string())),
        }
        Ok(query)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Send a request, turning transport failures and non-2xx answers into errors
    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await.map_err(|e| {
            ClientError::new(format!("Request to Data Plane API failed: {}", e)).with_cause(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        Err(ClientError::new(message).with_status(status.as_u16()))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        response.json().await.map_err(|e| {
            ClientError::new(format!("Invalid response from Data Plane API: {}", e)).with_cause(e)
        })
    }

    /// Current configuration version, required by writes outside a transaction
    pub async fn configuration_version(&self) -> ClientResult<u64> {
        let url = self.endpoint(&["services", "haproxy", "configuration", "version"])?;
        log::debug!("GET {}", url);
        let response = self.send(self.request(Method::GET, url)).await?;
        Self::read_json(response).await
    }

    async fn list_rules(&self, scope: &CollectionScope) -> ClientResult<Vec<ObservedRule>> {
        let url = self.collection_url(scope, None)?;
        log::debug!("GET {}", url);

        let mut query = self.parent_query(scope);
        if let Some(id) = &scope.transaction {
            query.push(("transaction_id", id.to_string()));
        }
        let response = self
            .send(self.request(Method::GET, url).query(&query))
            .await?;

        let items = match self.api_version {
            ApiVersion::V2 => Self::read_json::<VersionedList>(response).await?.data,
            ApiVersion::V3 => Self::read_json::<Vec<Json>>(response).await?,
        };
        observed_from_list(items)
            .map_err(|e| ClientError::new(format!("Invalid rule in {}: {}", scope, e)))
    }

    async fn create_rule(&self, scope: &CollectionScope, index: usize, rule: &Rule) -> ClientResult<()> {
        let query = self.write_query(scope).await?;
        let (url, body) = match self.api_version {
            ApiVersion::V2 => (self.collection_url(scope, None)?, rule_to_json(rule, Some(index))),
            ApiVersion::V3 => (self.collection_url(scope, Some(index))?, rule_to_json(rule, None)),
        };
        log::debug!("POST {} ({})", url, rule.summary());

        self.send(self.request(Method::POST, url).query(&query).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_rule(&self, scope: &CollectionScope, index: usize) -> ClientResult<()> {
        let query = self.write_query(scope).await?;
        let url = self.collection_url(scope, Some(index))?;
        log::debug!("DELETE {}", url);

        self.send(self.request(Method::DELETE, url).query(&query))
            .await?;
        Ok(())
    }

    async fn replace_rules(&self, scope: &CollectionScope, rules: &[Rule]) -> ClientResult<()> {
        if self.api_version == ApiVersion::V2 {
            return Err(ClientError::new(
                "The v2 API cannot replace a whole rule collection",
            ));
        }

        let query = self.write_query(scope).await?;
        let url = self.collection_url(scope, None)?;
        log::debug!("PUT {} ({} rules)", url, rules.len());

        let body: Vec<Json> = rules.iter().map(|rule| rule_to_json(rule, None)).collect();
        self.send(self.request(Method::PUT, url).query(&query).json(&body))
            .await?;
        Ok(())
    }

    fn transaction_url(&self, id: Option<&TransactionId>) -> ClientResult<Url> {
        let mut segments = vec!["services", "haproxy", "transactions"];
        if let Some(id) = id {
            segments.push(id.as_str());
        }
        self.endpoint(&segments)
    }
}

impl RuleCollectionClient for DataPlaneClient {
    fn list<'a>(
        &'a self,
        scope: &'a CollectionScope,
    ) -> BoxFuture<'a, ClientResult<Vec<ObservedRule>>> {
        Box::pin(self.list_rules(scope))
    }

    fn create_one<'a>(
        &'a self,
        scope: &'a CollectionScope,
        index: usize,
        rule: &'a Rule,
    ) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(self.create_rule(scope, index, rule))
    }

    fn delete_one<'a>(
        &'a self,
        scope: &'a CollectionScope,
        index: usize,
    ) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(self.delete_rule(scope, index))
    }

    fn replace_all<'a>(
        &'a self,
        scope: &'a CollectionScope,
        rules: &'a [Rule],
    ) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(self.replace_rules(scope, rules))
    }
}

#[async_trait]
impl Transactions for DataPlaneClient {
    async fn begin(&self) -> TransactionResult<TransactionId> {
        let begin = async {
            let version = self.configuration_version().await?;
            let url = self.transaction_url(None)?;
            log::debug!("POST {} (version {})", url, version);

            let response = self
                .send(
                    self.request(Method::POST, url)
                        .query(&[("version", version.to_string())]),
                )
                .await?;
            Self::read_json::<TransactionBody>(response).await
        };

        let body = begin
            .await
            .map_err(|e| TransactionError::Begin(e.to_string()))?;
        log::info!("Opened transaction {}", body.id);
        Ok(TransactionId::new(body.id))
    }

    async fn commit(&self, id: &TransactionId) -> TransactionResult<()> {
        let commit = async {
            let url = self.transaction_url(Some(id))?;
            log::debug!("PUT {}", url);
            self.send(self.request(Method::PUT, url)).await
        };

        commit.await.map_err(|e| TransactionError::Commit {
            id: id.clone(),
            message: e.to_string(),
        })?;
        log::info!("Committed transaction {}", id);
        Ok(())
    }

    async fn rollback(&self, id: &TransactionId) -> TransactionResult<()> {
        let rollback = async {
            let url = self.transaction_url(Some(id))?;
            log::debug!("DELETE {}", url);
            self.send(self.request(Method::DELETE, url)).await
        };

        rollback.await.map_err(|e| TransactionError::Rollback {
            id: id.clone(),
            message: e.to_string(),
        })?;
        log::warn!("Rolled back transaction {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hapsync_core::reconciler::{Reconciler, ReconcileOutcome};
    use hapsync_core::rule::{Collection, ParentId};
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer, api_version: ApiVersion) -> DataPlaneClient {
        let config = DataPlaneConfig::new(server.uri(), "admin", "secret", api_version);
        DataPlaneClient::new(&config).unwrap()
    }

    fn web_requests() -> CollectionScope {
        CollectionScope::new(ParentId::backend("web"), Collection::HttpRequestRules)
    }

    #[test]
    fn rejects_invalid_url() {
        let config = DataPlaneConfig::new("not a url", "admin", "", ApiVersion::V3);
        assert!(DataPlaneClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn v3_list_uses_parent_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/v3/services/haproxy/configuration/backends/web/http_request_rules",
            ))
            .and(basic_auth("admin", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "deny", "deny_status": 403},
                {"type": "allow"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let observed = client(&server, ApiVersion::V3)
            .list(&web_requests())
            .await
            .unwrap();

        assert_eq!(
            observed,
            vec![
                ObservedRule::new(0, Rule::of_type("deny").with("deny_status", 403)),
                ObservedRule::new(1, Rule::of_type("allow")),
            ]
        );
    }

    #[tokio::test]
    async fn v2_list_uses_parent_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/services/haproxy/configuration/acls"))
            .and(query_param("parent_type", "frontend"))
            .and(query_param("parent_name", "public"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_version": 12,
                "data": [
                    {"index": 1, "acl_name": "is_static", "criterion": "path_end", "value": ".css"},
                    {"index": 0, "acl_name": "is_api", "criterion": "path_beg", "value": "/api"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scope = CollectionScope::new(ParentId::frontend("public"), Collection::Acls);
        let observed = client(&server, ApiVersion::V2).list(&scope).await.unwrap();

        assert_eq!(observed.len(), 2);
        assert_eq!(observed[0].index, 0);
        assert_eq!(observed[0].rule.get_str("acl_name"), Some("is_api"));
    }

    #[tokio::test]
    async fn v3_replace_all_in_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(
                "/v3/services/haproxy/configuration/backends/web/http_request_rules",
            ))
            .and(query_param("transaction_id", "tx-1"))
            .and(body_json(json!([
                {"type": "set-header", "hdr_name": "X-Foo", "hdr_format": "bar"}
            ])))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let scope = web_requests().with_transaction(TransactionId::new("tx-1"));
        let rules = vec![
            Rule::of_type("set-header")
                .with("hdr_name", "X-Foo")
                .with("hdr_format", "bar"),
        ];

        client(&server, ApiVersion::V3)
            .replace_all(&scope, &rules)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn v2_create_carries_index_and_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/services/haproxy/configuration/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(7)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/services/haproxy/configuration/http_request_rules"))
            .and(query_param("parent_type", "backend"))
            .and(query_param("parent_name", "web"))
            .and(query_param("version", "7"))
            .and(body_json(json!({"index": 2, "type": "allow"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, ApiVersion::V2)
            .create_one(&web_requests(), 2, &Rule::of_type("allow"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn v2_delete_addresses_index() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/services/haproxy/configuration/http_request_rules/3"))
            .and(query_param("parent_name", "web"))
            .and(query_param("transaction_id", "tx-9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let scope = web_requests().with_transaction(TransactionId::new("tx-9"));
        client(&server, ApiVersion::V2)
            .delete_one(&scope, 3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn v2_cannot_replace_all() {
        let server = MockServer::start().await;

        let result = client(&server, ApiVersion::V2)
            .replace_all(&web_requests(), &[])
            .await;

        assert!(result.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_carries_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": 404, "message": "backend web not found"})),
            )
            .mount(&server)
            .await;

        let error = client(&server, ApiVersion::V3)
            .list(&web_requests())
            .await
            .unwrap_err();

        assert_eq!(error.status, Some(404));
        assert_eq!(error.message, "backend web not found");
    }

    #[tokio::test]
    async fn transaction_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/services/haproxy/configuration/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(4)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v3/services/haproxy/transactions"))
            .and(query_param("version", "4"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "273e3385", "_version": 4, "status": "in_progress"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v3/services/haproxy/transactions/273e3385"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v3/services/haproxy/transactions/273e3385"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, ApiVersion::V3);
        let id = client.begin().await.unwrap();
        assert_eq!(id.as_str(), "273e3385");
        client.commit(&id).await.unwrap();
        client.rollback(&id).await.unwrap();
    }

    #[tokio::test]
    async fn commit_failure_names_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(406).set_body_json(json!({"message": "version mismatch"})),
            )
            .mount(&server)
            .await;

        let error = client(&server, ApiVersion::V3)
            .commit(&TransactionId::new("tx-1"))
            .await
            .unwrap_err();

        assert!(matches!(error, TransactionError::Commit { .. }));
        assert!(error.to_string().contains("version mismatch"));
    }

    #[tokio::test]
    async fn reconcile_new_rule_with_single_replace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/v3/services/haproxy/configuration/backends/web/http_request_rules",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(
                "/v3/services/haproxy/configuration/backends/web/http_request_rules",
            ))
            .and(query_param("transaction_id", "tx-1"))
            .and(body_json(json!([
                {"type": "set-header", "hdr_name": "X-Foo", "hdr_format": "bar"}
            ])))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, ApiVersion::V3);
        let reconciler = Reconciler::new(client, ApiVersion::V3.strategy());
        let scope = web_requests().with_transaction(TransactionId::new("tx-1"));
        let desired = vec![
            Rule::of_type("set-header")
                .with("hdr_name", "X-Foo")
                .with("hdr_format", "bar"),
        ];

        let outcome = reconciler.reconcile(&scope, &desired).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Changed { .. }));
    }

    #[tokio::test]
    async fn reconcile_up_to_date_issues_no_writes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_version": 3,
                "data": [{"index": 0, "type": "allow", "metadata": {"comment": "server side"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(client(&server, ApiVersion::V2), ApiVersion::V2.strategy());
        let outcome = reconciler
            .reconcile(&web_requests(), &[Rule::of_type("allow")])
            .await
            .unwrap();

        assert!(!outcome.is_change());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
