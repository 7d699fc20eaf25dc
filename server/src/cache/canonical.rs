//! Maps read queries onto cache keys.
//!
//! A query that is structurally identical to one of the registered shapes
//! (same collection, same filter field set and values, same sort, same page
//! size, no facets) is cached under a namespace key derived from the shape
//! and the query's variable field. Namespace keys of one variable value share
//! a prefix and can be dropped together. Every other query is cached under an
//! opaque key signed over its canonical serialization; those entries only
//! ever expire.

use crate::cache::util;
use ::agora_protocol::model::entity::{Entity, EntityKind, Status};
use ::agora_protocol::model::fields;
use ::agora_protocol::query::{Direction, FilterValue, Query};

pub const COMMUNITY_FEED: &str = "community_feed";
pub const DOCUMENT_FEED: &str = "document_feed";
pub const MODERATION_QUEUE: &str = "moderation_queue";
pub const SUSPENDED_LIST: &str = "suspended_list";
pub const ANSWER_POSTS: &str = "answer_posts";
pub const ANSWER_POST_REPLIES: &str = "answer_post_replies";
pub const BOOKMARKS: &str = "bookmarks";

#[derive(Clone, Debug)]
pub struct CanonicalShape {
    pub name: &'static str,
    pub kind: EntityKind,
    /// The one filter field whose value is copied from the incoming query.
    pub variable: &'static str,
    pub fixed: Vec<(&'static str, FilterValue)>,
    pub sort: Option<(&'static str, Direction)>,
    pub namespace: &'static str,
    pub bucket: &'static str,
}

impl CanonicalShape {
    /// The page one query of this shape for one variable value.
    pub fn template(&self, value: &str, page_size: u32) -> Query {
        let mut query = Query::new(self.kind)
            .filter(self.variable, value)
            .page_size(page_size);

        for (field, filter) in &self.fixed {
            query = query.filter(*field, filter.clone());
        }

        if let Some((field, direction)) = self.sort {
            query = query.sort(field, direction);
        }

        query.normalized()
    }

    pub fn has_dimension(&self, field: &str) -> bool {
        self.variable == field || self.fixed.iter().any(|(x, _)| *x == field)
    }

    pub fn prefix(&self, value: &str) -> String {
        util::namespace_prefix(self.namespace, value)
    }

    pub fn key(&self, value: &str, page: u32) -> String {
        util::namespace_key(self.namespace, value, self.bucket, page)
    }
}

fn visible_statuses() -> FilterValue {
    FilterValue::any_of([Status::Active.as_str(), Status::Reported.as_str()])
}

fn feed_shape(
    name: &'static str,
    bucket: &'static str,
    documents_only: bool,
) -> CanonicalShape {
    let mut fixed = vec![
        (fields::IS_ACTIVE, FilterValue::Bool(true)),
        (fields::IS_PROFANE, FilterValue::Bool(false)),
        (fields::STATUS, visible_statuses()),
    ];

    if documents_only {
        fixed.push((fields::HAS_DOCUMENT, FilterValue::Bool(true)));
    }

    CanonicalShape {
        name,
        kind: EntityKind::Question,
        variable: fields::COMMUNITY_ID,
        fixed,
        sort: Some((fields::CREATED_ON, Direction::Desc)),
        namespace: "feed",
        bucket,
    }
}

fn status_list_shape(name: &'static str, status: Status) -> CanonicalShape {
    CanonicalShape {
        name,
        kind: EntityKind::Question,
        variable: fields::COMMUNITY_ID,
        fixed: vec![
            (fields::IS_ACTIVE, FilterValue::Bool(true)),
            (fields::STATUS, FilterValue::from(status.as_str())),
        ],
        sort: Some((fields::UPDATED_ON, Direction::Desc)),
        namespace: "modq",
        bucket: status.as_str(),
    }
}

fn children_shape(
    name: &'static str,
    kind: EntityKind,
    parent_field: &'static str,
) -> CanonicalShape {
    CanonicalShape {
        name,
        kind,
        variable: parent_field,
        fixed: vec![
            (fields::IS_ACTIVE, FilterValue::Bool(true)),
            (fields::STATUS, visible_statuses()),
        ],
        sort: Some((fields::CREATED_ON, Direction::Asc)),
        namespace: "children",
        bucket: kind.as_str(),
    }
}

fn bookmarks_shape(kind: EntityKind) -> CanonicalShape {
    CanonicalShape {
        name: BOOKMARKS,
        kind,
        variable: fields::BOOKMARKED_BY,
        fixed: vec![],
        sort: None,
        namespace: "bookmarks",
        bucket: kind.as_str(),
    }
}

/// Shapes in evaluation order.
pub fn default_shapes() -> Vec<CanonicalShape> {
    vec![
        feed_shape(COMMUNITY_FEED, "default", false),
        feed_shape(DOCUMENT_FEED, "documents", true),
        status_list_shape(MODERATION_QUEUE, Status::Reported),
        status_list_shape(SUSPENDED_LIST, Status::Suspended),
        children_shape(ANSWER_POSTS, EntityKind::AnswerPost, fields::QUESTION_ID),
        children_shape(
            ANSWER_POST_REPLIES,
            EntityKind::AnswerPostReply,
            fields::ANSWER_POST_ID,
        ),
        bookmarks_shape(EntityKind::Question),
        bookmarks_shape(EntityKind::AnswerPost),
        bookmarks_shape(EntityKind::AnswerPostReply),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheKey {
    Namespace { shape: &'static str, key: String },
    Opaque(String),
}

impl CacheKey {
    pub fn as_str(&self) -> &str {
        match self {
            CacheKey::Namespace { key, .. } => key,
            CacheKey::Opaque(key) => key,
        }
    }

    pub fn shape(&self) -> Option<&'static str> {
        match self {
            CacheKey::Namespace { shape, .. } => Some(shape),
            CacheKey::Opaque(_) => None,
        }
    }
}

pub struct Canonicalizer {
    shapes: Vec<CanonicalShape>,
    page_size: u32,
    signing_key: Vec<u8>,
}

impl Canonicalizer {
    pub fn new(
        shapes: Vec<CanonicalShape>,
        page_size: u32,
        signing_key: &[u8],
    ) -> Self {
        Self {
            shapes,
            page_size,
            signing_key: signing_key.to_vec(),
        }
    }

    pub fn with_default_shapes(page_size: u32, signing_key: &[u8]) -> Self {
        Self::new(default_shapes(), page_size, signing_key)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn shape(&self, name: &str) -> Option<&CanonicalShape> {
        self.shapes.iter().find(|x| x.name == name)
    }

    pub fn derive_key(&self, query: &Query) -> ::anyhow::Result<CacheKey> {
        let query = query.clone().normalized();

        for shape in &self.shapes {
            if shape.kind != query.kind {
                continue;
            }

            let value = match query.text_filter(shape.variable) {
                Some(x) => x,
                None => continue,
            };

            let candidate =
                shape.template(value, self.page_size).page(query.page);

            if candidate == query {
                return Ok(CacheKey::Namespace {
                    shape: shape.name,
                    key: shape.key(value, query.page),
                });
            }
        }

        Ok(CacheKey::Opaque(self.opaque_key(&query)?))
    }

    pub fn opaque_key(&self, query: &Query) -> ::anyhow::Result<String> {
        let mac = ::hmac_sha256::HMAC::mac(
            query.canonical_bytes()?,
            &self.signing_key,
        );

        Ok(format!(
            "{}{}",
            util::OPAQUE_PREFIX,
            ::base64::encode_config(mac, ::base64::URL_SAFE_NO_PAD)
        ))
    }

    /// Prefixes of every namespace whose shape covers the entity. With a
    /// dimension only shapes filtering on that field are considered.
    pub fn prefixes_for(
        &self,
        entity: &Entity,
        dimension: Option<&str>,
    ) -> ::anyhow::Result<Vec<String>> {
        let document = entity.to_document()?;
        let mut prefixes: Vec<String> = vec![];

        for shape in &self.shapes {
            if shape.kind != entity.kind() {
                continue;
            }

            if let Some(dimension) = dimension {
                if !shape.has_dimension(dimension) {
                    continue;
                }
            }

            if let Some(value) =
                document.get(shape.variable).and_then(|x| x.as_str())
            {
                let prefix = shape.prefix(value);
                if !prefixes.contains(&prefix) {
                    prefixes.push(prefix);
                }
            }
        }

        Ok(prefixes)
    }
}
