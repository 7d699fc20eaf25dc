use crate::cache::canonical::{CacheKey, Canonicalizer};
use crate::cache::util;
use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::feed;
use crate::mirror;
use crate::stores::Stores;
use ::agora_protocol::model::entity::{Entity, EntityKind, Status};
use ::agora_protocol::model::feed::{FeedPage, ReportStats};
use ::agora_protocol::model::fields;
use ::agora_protocol::model::ids::{CommunityId, EntityId, UserId};
use ::agora_protocol::model::ledger::{LedgerFilter, LedgerKind};
use ::agora_protocol::query::{Direction, FilterValue, Query};
use ::std::sync::Arc;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Cache first read path. Single entities fall back to the record store,
/// listings to the search index or, for bookmarks, to the ledger.
#[derive(Clone)]
pub struct Reader {
    stores: Stores,
    canonicalizer: Arc<Canonicalizer>,
    settings: SyncSettings,
}

impl Reader {
    pub fn new(
        stores: Stores,
        canonicalizer: Arc<Canonicalizer>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            stores,
            canonicalizer,
            settings,
        }
    }

    /// Suspended entities are returned with their status; soft deleted
    /// entities read as missing.
    pub async fn get_entity(&self, id: &EntityId) -> SyncResult<Entity> {
        let key = util::entity_key(id);

        let entity = match util::get_json::<Entity>(self.stores.cache.as_ref(), &key)
            .await
        {
            Some(entity) => {
                ::log::debug!("entity cache hit {}", id);
                entity
            }
            None => {
                let entity = self.stores.records.get(id).await?.ok_or_else(|| {
                    SyncError::not_found(format!("entity {} not found", id))
                })?;

                if let Err(err) =
                    mirror::refresh_entity_cache(self.stores.cache.as_ref(), &entity)
                        .await
                {
                    ::log::warn!("entity cache fill for {} failed: {:?}", id, err);
                }

                entity
            }
        };

        if !entity.is_active() {
            return Err(SyncError::not_found(format!("entity {} not found", id)));
        }

        Ok(entity)
    }

    pub async fn query(&self, query: Query) -> SyncResult<FeedPage> {
        if query.page < 1 {
            return Err(SyncError::validation("page starts at 1"));
        }
        if query.page_size < 1 || query.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::validation(format!(
                "pageSize must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let query = query.normalized();
        let key = self.canonicalizer.derive_key(&query)?;

        if let Some(page) =
            util::get_json::<FeedPage>(self.stores.cache.as_ref(), key.as_str()).await
        {
            ::log::debug!("query cache hit {}", key.as_str());
            return Ok(page);
        }

        let page = if query.filters.contains_key(fields::BOOKMARKED_BY) {
            self.query_bookmarks(&query).await?
        } else {
            let result = self
                .stores
                .search
                .query(query.kind.collection(), &query)
                .await?;

            FeedPage {
                rows: feed::enrich_rows(self.stores.users.as_ref(), result.rows)
                    .await?,
                page: query.page,
                page_size: query.page_size,
                total_count: result.total_count,
            }
        };

        self.fill(&key, &page).await;

        Ok(page)
    }

    async fn fill(&self, key: &CacheKey, page: &FeedPage) {
        if let Err(err) = util::set_json(
            self.stores.cache.as_ref(),
            key.as_str(),
            page,
            Some(self.settings.feed_cache_ttl),
        )
        .await
        {
            ::log::warn!("query cache fill {} failed: {:?}", key.as_str(), err);
        }
    }

    /// Bookmarks are ledger rows, most recent first. Remaining filters are
    /// evaluated against the bookmarked documents.
    async fn query_bookmarks(&self, query: &Query) -> SyncResult<FeedPage> {
        let user = query
            .text_filter(fields::BOOKMARKED_BY)
            .map(UserId::from)
            .ok_or_else(|| {
                SyncError::validation("bookmarkedBy must be a single user")
            })?;

        let rows = self
            .stores
            .ledger
            .query(
                &LedgerFilter::kind(LedgerKind::Bookmark)
                    .actor(&user)
                    .active(true),
                None,
            )
            .await?;

        let ids: Vec<EntityId> = rows
            .iter()
            .filter_map(|row| match row.subject.parse::<EntityId>() {
                Ok(id) => Some(id),
                Err(err) => {
                    ::log::warn!("skipping malformed bookmark {}: {}", row.subject, err);
                    None
                }
            })
            .collect();

        let loaded = ::futures::future::try_join_all(
            ids.iter().map(|id| self.stores.records.get(id)),
        )
        .await?;

        let mut entities = vec![];
        for entity in loaded.into_iter().flatten() {
            if !entity.is_active() || entity.kind() != query.kind {
                continue;
            }

            let document = entity.to_document()?;
            let matches = query
                .filters
                .iter()
                .filter(|(field, _)| field.as_str() != fields::BOOKMARKED_BY)
                .all(|(field, filter)| filter.matches(document.get(field)));

            if matches {
                entities.push(entity);
            }
        }

        let total_count = entities.len() as u64;
        let page: Vec<Entity> = entities
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .collect();

        Ok(FeedPage {
            rows: feed::enrich_entities(self.stores.users.as_ref(), page).await?,
            page: query.page,
            page_size: query.page_size,
            total_count,
        })
    }

    fn shape_query(&self, shape: &str, value: &str, page: u32) -> SyncResult<Query> {
        let shape = self.canonicalizer.shape(shape).ok_or_else(|| {
            SyncError::from(::anyhow::anyhow!("shape {} not registered", shape))
        })?;

        Ok(shape
            .template(value, self.canonicalizer.page_size())
            .page(page))
    }

    pub async fn community_feed(
        &self,
        community: &CommunityId,
        page: u32,
        documents_only: bool,
    ) -> SyncResult<FeedPage> {
        let shape = if documents_only {
            crate::cache::canonical::DOCUMENT_FEED
        } else {
            crate::cache::canonical::COMMUNITY_FEED
        };

        self.query(self.shape_query(shape, community.as_str(), page)?)
            .await
    }

    /// Visible questions across every community, newest first.
    pub async fn global_feed(&self, page: u32) -> SyncResult<FeedPage> {
        let query = Query::new(EntityKind::Question)
            .filter(fields::IS_ACTIVE, true)
            .filter(fields::IS_PROFANE, false)
            .filter(
                fields::STATUS,
                FilterValue::any_of([
                    Status::Active.as_str(),
                    Status::Reported.as_str(),
                ]),
            )
            .sort(fields::CREATED_ON, Direction::Desc)
            .page(page)
            .page_size(self.canonicalizer.page_size());

        self.query(query).await
    }

    pub async fn moderation_queue(
        &self,
        community: &CommunityId,
        page: u32,
    ) -> SyncResult<FeedPage> {
        self.query(self.shape_query(
            crate::cache::canonical::MODERATION_QUEUE,
            community.as_str(),
            page,
        )?)
        .await
    }

    pub async fn children(
        &self,
        parent: &EntityId,
        page: u32,
    ) -> SyncResult<FeedPage> {
        let parent = self.get_entity(parent).await?;

        let shape = match parent.kind() {
            EntityKind::Question => crate::cache::canonical::ANSWER_POSTS,
            EntityKind::AnswerPost => crate::cache::canonical::ANSWER_POST_REPLIES,
            EntityKind::AnswerPostReply => {
                return Err(SyncError::validation("replies have no children"))
            }
        };

        self.query(self.shape_query(shape, &parent.id().to_string(), page)?)
            .await
    }

    pub async fn bookmarks(
        &self,
        user: &UserId,
        kind: EntityKind,
        page: u32,
    ) -> SyncResult<FeedPage> {
        let query = Query::new(kind)
            .filter(fields::BOOKMARKED_BY, user.as_str())
            .page(page)
            .page_size(self.canonicalizer.page_size());

        self.query(query).await
    }

    /// Question counts per moderation status for one community.
    pub async fn report_stats(
        &self,
        community: &CommunityId,
    ) -> SyncResult<ReportStats> {
        let query = Query::new(EntityKind::Question)
            .filter(fields::COMMUNITY_ID, community.as_str())
            .filter(fields::IS_ACTIVE, true)
            .facet(fields::STATUS)
            .page_size(1)
            .normalized();

        let key = self.canonicalizer.opaque_key(&query)?;

        if let Some(stats) =
            util::get_json::<ReportStats>(self.stores.cache.as_ref(), &key).await
        {
            return Ok(stats);
        }

        let result = self
            .stores
            .search
            .query(EntityKind::Question.collection(), &query)
            .await?;

        let counts = result.facets.get(fields::STATUS);
        let count = |status: Status| {
            counts
                .and_then(|x| x.get(status.as_str()))
                .copied()
                .unwrap_or(0)
        };

        let stats = ReportStats {
            community_id: community.clone(),
            active: count(Status::Active),
            reported: count(Status::Reported),
            suspended: count(Status::Suspended),
            total: result.total_count,
        };

        if let Err(err) = util::set_json(
            self.stores.cache.as_ref(),
            &key,
            &stats,
            Some(self.settings.feed_cache_ttl),
        )
        .await
        {
            ::log::warn!("report stats cache fill failed: {:?}", err);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::test_utils::Harness;
    use ::agora_protocol::model::ledger::VoteDirection;
    use ::agora_protocol::test_utils::{make_test_draft, make_test_question};

    async fn create_question(harness: &Harness, user: &str) -> Entity {
        harness
            .synchronizer()
            .create(
                &Identity::user(user),
                make_test_draft(EntityKind::Question, "c1", None),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn entity_read_fills_cache_from_record_store() {
        let harness = Harness::new();
        let question = make_test_question("c1", "u1");
        harness.stores.records.put(&question).await.unwrap();

        let read = harness.reader().get_entity(&question.id()).await.unwrap();
        assert_eq!(read.id(), question.id());
        assert!(harness
            .cache
            .keys()
            .await
            .contains(&util::entity_key(&question.id())));

        assert!(matches!(
            harness.reader().get_entity(&EntityId::new()).await,
            Err(SyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleted_entity_reads_as_missing() {
        let harness = Harness::new();
        let question = create_question(&harness, "u1").await;
        harness
            .synchronizer()
            .soft_delete(&Identity::user("u1"), &question.id())
            .await
            .unwrap();

        assert!(matches!(
            harness.reader().get_entity(&question.id()).await,
            Err(SyncError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn feed_is_served_from_cache_until_invalidated() {
        let harness = Harness::new();
        harness.add_user("u1", "Alice").await;
        let question = create_question(&harness, "u1").await;
        let reader = harness.reader();
        let community = CommunityId::from("c1");

        let before = harness.search.query_count();
        let page = reader.community_feed(&community, 1, false).await.unwrap();
        assert_eq!(harness.search.query_count(), before);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(
            page.rows[0].creator.as_ref().unwrap().display_name,
            "Alice"
        );

        harness
            .synchronizer()
            .vote(&Identity::user("u2"), &question.id(), VoteDirection::Up)
            .await
            .unwrap();

        let page = reader.community_feed(&community, 1, false).await.unwrap();
        assert_eq!(page.rows[0].entity.base().votes, 1);
    }

    #[tokio::test]
    async fn opaque_queries_hit_search_once() {
        let harness = Harness::new();
        create_question(&harness, "u1").await;
        create_question(&harness, "u2").await;
        let reader = harness.reader();

        let query = Query::new(EntityKind::Question)
            .filter(fields::CREATED_BY, "u2")
            .page_size(5);

        let before = harness.search.query_count();
        let first = reader.query(query.clone()).await.unwrap();
        let second = reader.query(query).await.unwrap();

        assert_eq!(harness.search.query_count(), before + 1);
        assert_eq!(first, second);
        assert_eq!(first.total_count, 1);
    }

    #[tokio::test]
    async fn rejects_out_of_range_paging() {
        let reader = Harness::new().reader();

        for query in [
            Query::new(EntityKind::Question).page(0),
            Query::new(EntityKind::Question).page_size(0),
            Query::new(EntityKind::Question).page_size(MAX_PAGE_SIZE + 1),
        ] {
            assert!(matches!(
                reader.query(query).await,
                Err(SyncError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn bookmarks_come_from_the_ledger() {
        let harness = Harness::new();
        let synchronizer = harness.synchronizer();
        let user = Identity::user("u9");

        let first = create_question(&harness, "u1").await;
        let second = create_question(&harness, "u1").await;
        let deleted = create_question(&harness, "u1").await;

        for question in [&first, &second, &deleted] {
            synchronizer.bookmark(&user, &question.id()).await.unwrap();
        }
        synchronizer
            .soft_delete(&Identity::user("u1"), &deleted.id())
            .await
            .unwrap();

        let reader = harness.reader();
        let page = reader
            .bookmarks(&user.user_id, EntityKind::Question, 1)
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);

        synchronizer.unbookmark(&user, &first.id()).await.unwrap();

        let page = reader
            .bookmarks(&user.user_id, EntityKind::Question, 1)
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.rows[0].entity.id(), second.id());
    }

    #[tokio::test]
    async fn children_listing_follows_creates() {
        let harness = Harness::new();
        let synchronizer = harness.synchronizer();
        let question = create_question(&harness, "u1").await;
        let reader = harness.reader();

        assert_eq!(
            reader.children(&question.id(), 1).await.unwrap().total_count,
            0
        );

        synchronizer
            .create(
                &Identity::user("u2"),
                make_test_draft(EntityKind::AnswerPost, "c1", Some(question.id())),
            )
            .await
            .unwrap();

        assert_eq!(
            reader.children(&question.id(), 1).await.unwrap().total_count,
            1
        );
    }

    #[tokio::test]
    async fn report_stats_counts_statuses() {
        let harness = Harness::with_settings(SyncSettings {
            report_threshold: 1,
            ..Default::default()
        });
        let synchronizer = harness.synchronizer();

        let questions = [
            create_question(&harness, "u1").await,
            create_question(&harness, "u1").await,
            create_question(&harness, "u1").await,
        ];
        synchronizer
            .report(&Identity::user("u2"), &questions[0].id())
            .await
            .unwrap();

        let stats = harness
            .reader()
            .report_stats(&CommunityId::from("c1"))
            .await
            .unwrap();

        assert_eq!(stats.active, 2);
        assert_eq!(stats.reported, 0);
        assert_eq!(stats.suspended, 1);
        assert_eq!(stats.total, 3);
    }
}
