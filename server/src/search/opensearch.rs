use crate::search::SearchIndex;
use ::agora_protocol::model::{entity::EntityKind, fields};
use ::agora_protocol::query::{Direction, FilterValue, Query, SearchResult};
use ::anyhow::Context;
use ::opensearch::{
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesPutMappingParts},
    params::Refresh,
    IndexParts, OpenSearch, SearchParts, UpdateParts,
};
use ::serde_json::json;
use ::std::collections::BTreeMap;

#[derive(::serde::Deserialize)]
pub(crate) struct OpenSearchTotal {
    pub(crate) value: u64,
}

#[derive(::serde::Deserialize)]
pub(crate) struct OpenSearchSearchHitsL2 {
    pub(crate) _source: ::serde_json::Value,
}

#[derive(::serde::Deserialize)]
pub(crate) struct OpenSearchSearchHitsL1 {
    pub(crate) total: Option<OpenSearchTotal>,
    pub(crate) hits: ::std::vec::Vec<OpenSearchSearchHitsL2>,
}

#[derive(::serde::Deserialize)]
pub(crate) struct OpenSearchAggregationBucket {
    pub(crate) key: ::serde_json::Value,
    pub(crate) key_as_string: Option<String>,
    pub(crate) doc_count: u64,
}

#[derive(::serde::Deserialize)]
pub(crate) struct OpenSearchAggregation {
    pub(crate) buckets: ::std::vec::Vec<OpenSearchAggregationBucket>,
}

#[derive(::serde::Deserialize)]
pub(crate) struct OpenSearchSearchL0 {
    pub(crate) hits: OpenSearchSearchHitsL1,
    pub(crate) aggregations: Option<BTreeMap<String, OpenSearchAggregation>>,
}

fn mappings() -> ::serde_json::Value {
    json!({
        "properties": {
            "id": { "type": "keyword" },
            "type": { "type": "keyword" },
            "status": { "type": "keyword" },
            "communityId": { "type": "keyword" },
            "createdBy": { "type": "keyword" },
            "updatedBy": { "type": "keyword" },
            "questionId": { "type": "keyword" },
            "answerPostId": { "type": "keyword" },
            "mentionedUsers": { "type": "keyword" },
            "explicitMentions": { "type": "keyword" },
            "reportedBy": { "type": "keyword" },
            "documents": { "type": "keyword" },
            "isActive": { "type": "boolean" },
            "isProfane": { "type": "boolean" },
            "hasDocument": { "type": "boolean" },
            "createdOn": { "type": "date", "format": "epoch_millis" },
            "updatedOn": { "type": "date", "format": "epoch_millis" },
            "votes": { "type": "long" },
            "title": { "type": "text" },
            "body": { "type": "text" },
            "extra": { "type": "object", "enabled": false }
        }
    })
}

/// Creates one index per entity kind, or refreshes the mappings of
/// indices that already exist.
pub async fn prepare_indices(client: &OpenSearch) -> ::anyhow::Result<()> {
    for kind in [
        EntityKind::Question,
        EntityKind::AnswerPost,
        EntityKind::AnswerPostReply,
    ] {
        let collection = kind.collection();

        let index_exists = match client
            .indices()
            .exists(IndicesExistsParts::Index(&[collection]))
            .send()
            .await
        {
            Ok(response) => response.status_code().is_success(),
            Err(_) => false,
        };

        let response = if !index_exists {
            client
                .indices()
                .create(IndicesCreateParts::Index(collection))
                .body(json!({ "mappings": mappings() }))
                .send()
                .await?
        } else {
            client
                .indices()
                .put_mapping(IndicesPutMappingParts::Index(&[collection]))
                .body(mappings())
                .send()
                .await?
        };

        if !response.status_code().is_success() {
            ::anyhow::bail!(
                "preparing index {} failed with {}",
                collection,
                response.status_code()
            );
        }

        ::log::info!("prepared search index {}", collection);
    }

    Ok(())
}

fn filter_clause(field: &str, value: &FilterValue) -> ::serde_json::Value {
    match value {
        FilterValue::Bool(x) => json!({ "term": { field: x } }),
        FilterValue::Text(x) => json!({ "term": { field: x } }),
        FilterValue::AnyOf(xs) => json!({ "terms": { field: xs } }),
    }
}

pub(crate) fn build_search_body(query: &Query) -> ::serde_json::Value {
    let filters: Vec<::serde_json::Value> = query
        .filters
        .iter()
        .map(|(field, value)| filter_clause(field, value))
        .collect();

    let mut body = json!({
        "track_total_hits": true,
        "query": {
            "bool": {
                "filter": filters
            }
        }
    });

    if let Some(sort) = &query.sort {
        let order = match sort.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        let field = sort.field.as_str();
        let tie_breaker = fields::ID;
        body["sort"] = json!([
            { field: { "order": order } },
            { tie_breaker: { "order": order } }
        ]);
    }

    if !query.facets.is_empty() {
        let aggregations: ::serde_json::Map<String, ::serde_json::Value> = query
            .facets
            .iter()
            .map(|field| {
                (
                    field.clone(),
                    json!({ "terms": { "field": field, "size": 100 } }),
                )
            })
            .collect();
        body["aggs"] = ::serde_json::Value::Object(aggregations);
    }

    body
}

pub struct OpenSearchIndex {
    client: OpenSearch,
}

impl OpenSearchIndex {
    pub fn new(client: OpenSearch) -> Self {
        Self { client }
    }

    async fn with_retry<F, Fut>(&self, what: &str, send: F) -> ::anyhow::Result<()>
    where
        F: Fn() -> Fut,
        Fut: ::std::future::Future<
            Output = Result<::opensearch::http::response::Response, ::opensearch::Error>,
        >,
    {
        let op = || async {
            match send().await {
                Ok(response) => {
                    let status = response.status_code();
                    if status.is_success() {
                        Ok(())
                    } else if status.is_client_error() {
                        Err(::backoff::Error::permanent(::anyhow::anyhow!(
                            "{} rejected with {}",
                            what,
                            status
                        )))
                    } else {
                        ::log::warn!(
                            "temporary failure during {} with status {:?}",
                            what,
                            status,
                        );
                        Err(::backoff::Error::transient(::anyhow::anyhow!(
                            "{} failed with {}",
                            what,
                            status
                        )))
                    }
                }
                Err(err) => Err(::backoff::Error::transient(
                    ::anyhow::Error::from(err),
                )),
            }
        };

        let backoff = ::backoff::ExponentialBackoff {
            max_elapsed_time: Some(::std::time::Duration::from_secs(10)),
            ..Default::default()
        };

        ::backoff::future::retry(backoff, op).await
    }
}

#[async_trait::async_trait]
impl SearchIndex for OpenSearchIndex {
    async fn index(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()> {
        self.with_retry("index", || {
            self.client
                .index(IndexParts::IndexId(collection, id))
                .refresh(Refresh::WaitFor)
                .body(document.clone())
                .send()
        })
        .await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()> {
        self.with_retry("update", || {
            self.client
                .update(UpdateParts::IndexId(collection, id))
                .refresh(Refresh::WaitFor)
                .body(json!({
                    "doc": document,
                    "doc_as_upsert": true,
                }))
                .send()
        })
        .await
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> ::anyhow::Result<SearchResult> {
        let response = self
            .client
            .search(SearchParts::Index(&[collection]))
            .from(i64::try_from(query.offset())?)
            .size(i64::from(query.page_size))
            .body(build_search_body(query))
            .send()
            .await
            .with_context(|| format!("search {}", collection))?;

        if !response.status_code().is_success() {
            ::anyhow::bail!(
                "search {} failed with {}",
                collection,
                response.status_code()
            );
        }

        let body = response.json::<OpenSearchSearchL0>().await?;

        let mut facets = BTreeMap::new();
        for (name, aggregation) in body.aggregations.unwrap_or_default() {
            let buckets = aggregation
                .buckets
                .into_iter()
                .map(|bucket| {
                    let key = match bucket.key_as_string {
                        Some(x) => x,
                        None => match bucket.key {
                            ::serde_json::Value::String(x) => x,
                            other => other.to_string(),
                        },
                    };
                    (key, bucket.doc_count)
                })
                .collect();
            facets.insert(name, buckets);
        }

        let rows: Vec<::serde_json::Value> =
            body.hits.hits.into_iter().map(|x| x._source).collect();

        Ok(SearchResult {
            total_count: body
                .hits
                .total
                .map(|x| x.value)
                .unwrap_or(rows.len() as u64),
            rows,
            facets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_body_has_filters_sort_and_aggregations() {
        let query = Query::new(EntityKind::Question)
            .filter(fields::COMMUNITY_ID, "c1")
            .filter(fields::IS_ACTIVE, true)
            .filter(fields::STATUS, FilterValue::any_of(["active", "reported"]))
            .sort(fields::CREATED_ON, Direction::Desc)
            .facet(fields::STATUS);

        let body = build_search_body(&query);

        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([
                { "term": { "communityId": "c1" } },
                { "term": { "isActive": true } },
                { "terms": { "status": ["active", "reported"] } },
            ])
        );
        assert_eq!(body["sort"][0]["createdOn"]["order"], "desc");
        assert_eq!(body["sort"][1]["id"]["order"], "desc");
        assert_eq!(body["aggs"]["status"]["terms"]["field"], "status");
        assert_eq!(body["track_total_hits"], true);
    }
}
