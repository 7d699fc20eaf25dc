use crate::search::SearchIndex;
use ::agora_protocol::model::fields;
use ::agora_protocol::query::{Direction, Query, SearchResult};
use ::std::cmp::Ordering;
use ::std::collections::{BTreeMap, HashMap};

/// Evaluates queries over documents held in memory with the same filter,
/// sort, paging and facet semantics as the OpenSearch adapter.
#[derive(Default)]
pub struct MemorySearchIndex {
    collections: ::tokio::sync::RwLock<
        HashMap<String, BTreeMap<String, ::serde_json::Value>>,
    >,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document(
        &self,
        collection: &str,
        id: &str,
    ) -> Option<::serde_json::Value> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|x| x.get(id))
            .cloned()
    }
}

fn compare_values(a: &::serde_json::Value, b: &::serde_json::Value) -> Ordering {
    use ::serde_json::Value;

    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn merge_document(stored: &mut ::serde_json::Value, patch: &::serde_json::Value) {
    use ::serde_json::Value;

    match (stored, patch) {
        (Value::Object(stored), Value::Object(patch)) => {
            for (key, value) in patch {
                merge_document(stored.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (stored, patch) => *stored = patch.clone(),
    }
}

fn facet_key(value: &::serde_json::Value) -> Option<String> {
    match value {
        ::serde_json::Value::String(x) => Some(x.clone()),
        ::serde_json::Value::Bool(x) => Some(x.to_string()),
        ::serde_json::Value::Number(x) => Some(x.to_string()),
        _ => None,
    }
}

#[async_trait::async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        Ok(())
    }

    /// Partial update with upsert. Objects merge key by key, as an
    /// OpenSearch `doc` update does.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        document: &::serde_json::Value,
    ) -> ::anyhow::Result<()> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert(::serde_json::Value::Null);

        merge_document(stored, document);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> ::anyhow::Result<SearchResult> {
        let collections = self.collections.read().await;

        let mut matched: Vec<&::serde_json::Value> = match collections
            .get(collection)
        {
            Some(documents) => documents
                .values()
                .filter(|document| {
                    query.filters.iter().all(|(field, filter)| {
                        filter.matches(document.get(field.as_str()))
                    })
                })
                .collect(),
            None => vec![],
        };

        if let Some(sort) = &query.sort {
            matched.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(sort.field.as_str()).unwrap_or(&::serde_json::Value::Null),
                    b.get(sort.field.as_str()).unwrap_or(&::serde_json::Value::Null),
                )
                .then_with(|| {
                    compare_values(
                        a.get(fields::ID).unwrap_or(&::serde_json::Value::Null),
                        b.get(fields::ID).unwrap_or(&::serde_json::Value::Null),
                    )
                });

                match sort.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        let mut facets = BTreeMap::new();
        for field in &query.facets {
            let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
            for document in &matched {
                if let Some(key) =
                    document.get(field.as_str()).and_then(facet_key)
                {
                    *buckets.entry(key).or_default() += 1;
                }
            }
            facets.insert(field.clone(), buckets);
        }

        let total_count = matched.len() as u64;

        let rows = matched
            .into_iter()
            .skip(usize::try_from(query.offset())?)
            .take(query.page_size as usize)
            .cloned()
            .collect();

        Ok(SearchResult {
            rows,
            total_count,
            facets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::agora_protocol::model::entity::{EntityKind, Status};
    use ::agora_protocol::query::FilterValue;
    use ::agora_protocol::test_utils::make_test_question;

    async fn seed(index: &MemorySearchIndex, count: i64) -> Vec<String> {
        let mut ids = vec![];
        for i in 0..count {
            let mut question = make_test_question("c1", "u1");
            question.base_mut().created_on =
                ::chrono::DateTime::from_timestamp_millis(1_000 + i).unwrap();
            if i % 3 == 0 {
                question.base_mut().status = Status::Reported;
            }
            let id = question.id().to_string();
            index
                .index("discussions", &id, &question.to_document().unwrap())
                .await
                .unwrap();
            ids.push(id);
        }
        ids
    }

    #[tokio::test]
    async fn index_replaces_while_update_merges() {
        let index = MemorySearchIndex::new();

        index
            .index("discussions", "q1", &::serde_json::json!({"extra": {"a": 1}}))
            .await
            .unwrap();
        index
            .update("discussions", "q1", &::serde_json::json!({"extra": {"b": 2}}))
            .await
            .unwrap();
        assert_eq!(
            index.document("discussions", "q1").await.unwrap(),
            ::serde_json::json!({"extra": {"a": 1, "b": 2}})
        );

        index
            .index("discussions", "q1", &::serde_json::json!({"extra": {}}))
            .await
            .unwrap();
        assert_eq!(
            index.document("discussions", "q1").await.unwrap(),
            ::serde_json::json!({"extra": {}})
        );
    }

    #[tokio::test]
    async fn filters_sorts_and_pages() {
        let index = MemorySearchIndex::new();
        let ids = seed(&index, 7).await;

        let query = Query::new(EntityKind::Question)
            .filter(fields::COMMUNITY_ID, "c1")
            .filter(fields::IS_ACTIVE, true)
            .sort(fields::CREATED_ON, Direction::Desc)
            .page_size(3)
            .page(2);

        let result = index.query("discussions", &query).await.unwrap();

        assert_eq!(result.total_count, 7);
        let page_ids: Vec<String> = result
            .rows
            .iter()
            .map(|x| x[fields::ID].as_str().unwrap().to_string())
            .collect();
        assert_eq!(page_ids, vec![ids[3].clone(), ids[2].clone(), ids[1].clone()]);
    }

    #[tokio::test]
    async fn counts_facets_over_all_matches() {
        let index = MemorySearchIndex::new();
        seed(&index, 7).await;

        let query = Query::new(EntityKind::Question)
            .filter(fields::COMMUNITY_ID, "c1")
            .facet(fields::STATUS)
            .page_size(1);

        let result = index.query("discussions", &query).await.unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.facets[fields::STATUS]["reported"], 3);
        assert_eq!(result.facets[fields::STATUS]["active"], 4);

        let reported = Query::new(EntityKind::Question)
            .filter(fields::STATUS, FilterValue::any_of(["reported"]));
        let result = index.query("discussions", &reported).await.unwrap();
        assert_eq!(result.total_count, 3);

        let other = index.query("missing", &reported).await.unwrap();
        assert_eq!(other.total_count, 0);
    }
}
