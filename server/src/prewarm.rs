use crate::cache::canonical::{self, Canonicalizer};
use crate::cache::util;
use crate::config::SyncSettings;
use crate::feed;
use crate::stores::Stores;
use ::agora_protocol::model::feed::FeedPage;
use ::agora_protocol::model::ids::CommunityId;
use ::std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedVariant {
    Default,
    Documents,
}

impl FeedVariant {
    pub fn shape_name(&self) -> &'static str {
        match self {
            FeedVariant::Default => canonical::COMMUNITY_FEED,
            FeedVariant::Documents => canonical::DOCUMENT_FEED,
        }
    }
}

/// Eagerly populates the first pages of a community feed.
#[derive(Clone)]
pub struct Prewarmer {
    stores: Stores,
    canonicalizer: Arc<Canonicalizer>,
    settings: SyncSettings,
}

impl Prewarmer {
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

    /// Fetches `pages × pageSize` rows in one query and writes each
    /// populated page under its namespace key. Keys of pages beyond the
    /// last populated one are deleted. Returns the number of pages written.
    pub async fn prewarm(
        &self,
        community: &CommunityId,
        variant: FeedVariant,
    ) -> ::anyhow::Result<u32> {
        let shape = self
            .canonicalizer
            .shape(variant.shape_name())
            .ok_or_else(|| {
                ::anyhow::anyhow!("shape {} not registered", variant.shape_name())
            })?;

        let page_size = self.canonicalizer.page_size().max(1);
        let pages = self.settings.prewarm_pages;

        let query = shape.template(community.as_str(), page_size * pages);

        let result = self
            .stores
            .search
            .query(shape.kind.collection(), &query)
            .await?;

        let total_count = result.total_count;
        let rows =
            feed::enrich_rows(self.stores.users.as_ref(), result.rows).await?;
        let mut chunks = rows.chunks(page_size as usize);

        let mut written = 0;
        for page in 1..=pages {
            let key = shape.key(community.as_str(), page);

            match chunks.next() {
                Some(chunk) => {
                    let value = FeedPage {
                        rows: chunk.to_vec(),
                        page,
                        page_size,
                        total_count,
                    };
                    util::set_json(
                        self.stores.cache.as_ref(),
                        &key,
                        &value,
                        Some(self.settings.prewarm_cache_ttl),
                    )
                    .await?;
                    written += 1;
                }
                None => self.stores.cache.delete(&key).await?,
            }
        }

        ::log::debug!(
            "prewarmed {} pages of {:?} feed for {}",
            written,
            variant,
            community
        );

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;
    use ::agora_protocol::model::entity::Status;
    use ::agora_protocol::test_utils::make_test_question;

    async fn seed(harness: &Harness, community: &str, count: i64) {
        for i in 0..count {
            let mut question = make_test_question(community, "u1");
            question.base_mut().created_on =
                ::chrono::DateTime::from_timestamp_millis(10_000 + i).unwrap();
            crate::mirror::mirror_search(harness.stores.search.as_ref(), &question)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn writes_only_populated_pages() {
        let harness = Harness::new();
        seed(&harness, "c1", 23).await;

        // a stale fourth page from an earlier, longer feed
        harness
            .stores
            .cache
            .set("feed:c1:default:p4", b"{}".to_vec(), None)
            .await
            .unwrap();

        let written = harness
            .prewarmer()
            .prewarm(&CommunityId::from("c1"), FeedVariant::Default)
            .await
            .unwrap();
        assert_eq!(written, 3);

        let mut sizes = vec![];
        for page in 1..=3 {
            let cached: FeedPage = util::get_json(
                harness.stores.cache.as_ref(),
                &format!("feed:c1:default:p{}", page),
            )
            .await
            .unwrap();
            assert_eq!(cached.page, page);
            assert_eq!(cached.total_count, 23);
            sizes.push(cached.rows.len());
        }
        assert_eq!(sizes, vec![10, 10, 3]);

        for page in 4..=5 {
            assert!(harness
                .stores
                .cache
                .get(&format!("feed:c1:default:p{}", page))
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn pages_are_newest_first_and_exclude_hidden_rows() {
        let harness = Harness::new();
        seed(&harness, "c1", 3).await;

        let mut suspended = make_test_question("c1", "u1");
        suspended.base_mut().status = Status::Suspended;
        let mut profane = make_test_question("c1", "u1");
        profane.base_mut().is_profane = true;
        let mut deleted = make_test_question("c1", "u1");
        deleted.base_mut().is_active = false;
        let other = make_test_question("c2", "u1");
        for entity in [&suspended, &profane, &deleted, &other] {
            crate::mirror::mirror_search(harness.stores.search.as_ref(), entity)
                .await
                .unwrap();
        }

        harness
            .prewarmer()
            .prewarm(&CommunityId::from("c1"), FeedVariant::Default)
            .await
            .unwrap();

        let cached: FeedPage = util::get_json(
            harness.stores.cache.as_ref(),
            "feed:c1:default:p1",
        )
        .await
        .unwrap();

        assert_eq!(cached.rows.len(), 3);
        let created: Vec<i64> = cached
            .rows
            .iter()
            .map(|x| x.entity.base().created_on.timestamp_millis())
            .collect();
        assert_eq!(created, vec![10_002, 10_001, 10_000]);
    }

    #[tokio::test]
    async fn document_variant_uses_its_own_namespace() {
        let harness = Harness::new();
        let mut question = make_test_question("c1", "u1");
        question.base_mut().has_document = true;
        question.base_mut().documents = vec!["docs/a.pdf".to_string()];
        crate::mirror::mirror_search(harness.stores.search.as_ref(), &question)
            .await
            .unwrap();
        seed(&harness, "c1", 2).await;

        let written = harness
            .prewarmer()
            .prewarm(&CommunityId::from("c1"), FeedVariant::Documents)
            .await
            .unwrap();
        assert_eq!(written, 1);

        let cached: FeedPage = util::get_json(
            harness.stores.cache.as_ref(),
            "feed:c1:documents:p1",
        )
        .await
        .unwrap();
        assert_eq!(cached.rows.len(), 1);
        assert_eq!(cached.rows[0].entity.id(), question.id());
    }
}
