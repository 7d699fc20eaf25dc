use crate::model::entity::EntityKind;
use ::std::collections::BTreeMap;

/// A single filter condition. `AnyOf` is compared as a set: values are
/// sorted and deduplicated by `Query::normalized`, and a one element set
/// becomes `Text`.
#[derive(
    ::serde::Serialize, ::serde::Deserialize, PartialEq, Eq, Clone, Debug,
)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Text(String),
    AnyOf(Vec<String>),
}

impl FilterValue {
    pub fn any_of<I, S>(values: I) -> FilterValue
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::AnyOf(values.into_iter().map(Into::into).collect())
    }

    fn normalized(self) -> FilterValue {
        match self {
            FilterValue::AnyOf(mut values) => {
                values.sort();
                values.dedup();
                if values.len() == 1 {
                    FilterValue::Text(values.remove(0))
                } else {
                    FilterValue::AnyOf(values)
                }
            }
            other => other,
        }
    }

    /// Evaluates the condition against one document field. A missing
    /// boolean field reads as false.
    pub fn matches(&self, value: Option<&::serde_json::Value>) -> bool {
        match (self, value) {
            (FilterValue::Bool(expected), Some(::serde_json::Value::Bool(x))) => {
                expected == x
            }
            (FilterValue::Bool(expected), None)
            | (FilterValue::Bool(expected), Some(::serde_json::Value::Null)) => {
                !expected
            }
            (FilterValue::Text(expected), Some(x)) => text_matches(expected, x),
            (FilterValue::AnyOf(expected), Some(x)) => {
                expected.iter().any(|e| text_matches(e, x))
            }
            _ => false,
        }
    }
}

fn text_matches(expected: &str, value: &::serde_json::Value) -> bool {
    match value {
        ::serde_json::Value::String(x) => x == expected,
        ::serde_json::Value::Array(xs) => {
            xs.iter().any(|x| x.as_str() == Some(expected))
        }
        ::serde_json::Value::Number(x) => x.to_string() == expected,
        _ => false,
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

#[derive(
    ::serde::Serialize, ::serde::Deserialize, PartialEq, Eq, Clone, Copy, Debug,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(
    ::serde::Serialize, ::serde::Deserialize, PartialEq, Eq, Clone, Debug,
)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

/// A paginated read against one collection.
#[derive(
    ::serde::Serialize, ::serde::Deserialize, PartialEq, Eq, Clone, Debug,
)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub sort: Option<Sort>,
    /// One based.
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub facets: Vec<String>,
}

impl Query {
    pub fn new(kind: EntityKind) -> Query {
        Query {
            kind,
            filters: BTreeMap::new(),
            sort: None,
            page: default_page(),
            page_size: default_page_size(),
            facets: vec![],
        }
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn facet(mut self, field: impl Into<String>) -> Self {
        self.facets.push(field.into());
        self
    }

    /// Sorts set-valued filters and facets and clamps the page to one, so
    /// that equal queries compare and serialize identically.
    pub fn normalized(mut self) -> Query {
        self.filters = self
            .filters
            .into_iter()
            .map(|(k, v)| (k, v.normalized()))
            .collect();
        self.facets.sort();
        self.facets.dedup();
        self.page = self.page.max(1);
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }

    pub fn text_filter(&self, field: &str) -> Option<&str> {
        match self.filters.get(field) {
            Some(FilterValue::Text(x)) => Some(x),
            _ => None,
        }
    }

    /// Deterministic serialization used to derive opaque cache keys.
    pub fn canonical_bytes(&self) -> ::anyhow::Result<Vec<u8>> {
        Ok(::serde_json::to_vec(&self.clone().normalized())?)
    }
}

/// Rows of one page plus the total match count and requested facet
/// counts.
#[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub rows: Vec<::serde_json::Value>,
    pub total_count: u64,
    #[serde(default)]
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::model::fields;

    #[test]
    fn normalization_makes_set_filters_order_independent() {
        let a = Query::new(EntityKind::Question)
            .filter(fields::STATUS, FilterValue::any_of(["reported", "active"]));
        let b = Query::new(EntityKind::Question).filter(
            fields::STATUS,
            FilterValue::any_of(["active", "reported", "active"]),
        );

        assert_ne!(a, b);
        assert_eq!(a.clone().normalized(), b.clone().normalized());
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn offset_is_zero_based_from_one_based_page() {
        let query = Query::new(EntityKind::Question).page_size(10);
        assert_eq!(query.clone().page(1).offset(), 0);
        assert_eq!(query.clone().page(3).offset(), 20);
        assert_eq!(query.page(0).offset(), 0);
    }

    #[test]
    fn single_element_set_normalizes_to_text() {
        let query = Query::new(EntityKind::Question)
            .filter(fields::STATUS, FilterValue::any_of(["reported"]))
            .normalized();
        assert_eq!(query.text_filter(fields::STATUS), Some("reported"));
    }

    #[test]
    fn filter_value_matching() {
        let value = ::serde_json::json!({
            "status": "reported",
            "isActive": true,
            "documents": ["a", "b"],
        });

        assert!(FilterValue::from("reported").matches(value.get("status")));
        assert!(FilterValue::any_of(["active", "reported"])
            .matches(value.get("status")));
        assert!(!FilterValue::any_of(["active"]).matches(value.get("status")));
        assert!(FilterValue::from(true).matches(value.get("isActive")));
        assert!(FilterValue::from(false).matches(value.get("isProfane")));
        assert!(FilterValue::from("b").matches(value.get("documents")));
        assert!(!FilterValue::from("x").matches(value.get("missing")));
    }

    #[test]
    fn query_deserializes_with_defaults() {
        let query: Query = ::serde_json::from_value(::serde_json::json!({
            "type": "question",
            "filters": {
                "communityId": "c1",
                "isActive": true,
                "status": ["active", "reported"],
            },
        }))
        .unwrap();

        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 10);
        assert_eq!(query.text_filter(fields::COMMUNITY_ID), Some("c1"));
        assert_eq!(
            query.filters.get(fields::STATUS),
            Some(&FilterValue::any_of(["active", "reported"]))
        );
    }
}
