//! Mutation orchestration.
//!
//! Every mutation runs the same fixed order: validate and write the
//! durable record (record store, or ledger for ledger-only actions),
//! counters, moderation, search mirror, entity cache, namespace
//! invalidation, prewarm, notification. Nothing after the durable write can
//! fail the call; those steps go through `after_commit` which logs and
//! counts the failure.

use crate::cache::canonical::Canonicalizer;
use crate::cache::util;
use crate::config::SyncSettings;
use crate::counts::{child_link_key, CounterAggregator, CounterKind};
use crate::error::{SyncError, SyncResult};
use crate::identity::Identity;
use crate::metrics;
use crate::mirror;
use crate::moderation;
use crate::notify::NotificationEvent;
use crate::prewarm::{FeedVariant, Prewarmer};
use crate::stores::Stores;
use crate::text::TextAnalyzer;
use ::agora_protocol::model::entity::{
    AnswerPost, AnswerPostReply, BaseFields, Entity, EntityKind, Question,
    Status,
};
use ::agora_protocol::model::fields;
use ::agora_protocol::model::ids::{CommunityId, EntityId, UserId};
use ::agora_protocol::model::ledger::{
    LedgerFilter, LedgerKey, LedgerKind, LedgerRow, VoteDirection,
};
use ::agora_protocol::model::payload::{
    EntityDraft, EntityPatch, ModerationAction,
};
use ::std::fmt::Display;
use ::std::future::Future;
use ::std::sync::Arc;

pub mod events {
    pub const ANSWER_POST_CREATED: &str = "answer_post_created";
    pub const ANSWER_POST_REPLY_CREATED: &str = "answer_post_reply_created";
    pub const MENTIONED: &str = "mentioned";
    pub const SUSPENDED: &str = "entity_suspended";
}

#[derive(Clone)]
pub struct Synchronizer {
    stores: Stores,
    canonicalizer: Arc<Canonicalizer>,
    settings: SyncSettings,
    analyzer: TextAnalyzer,
    metrics: Arc<::cadence::StatsdClient>,
    counters: CounterAggregator,
    prewarmer: Prewarmer,
}

impl Synchronizer {
    pub fn new(
        stores: Stores,
        canonicalizer: Arc<Canonicalizer>,
        settings: SyncSettings,
        analyzer: TextAnalyzer,
        metrics: Arc<::cadence::StatsdClient>,
    ) -> Self {
        let counters = CounterAggregator::new(stores.clone());
        let prewarmer = Prewarmer::new(
            stores.clone(),
            canonicalizer.clone(),
            settings.clone(),
        );

        Self {
            stores,
            canonicalizer,
            settings,
            analyzer,
            metrics,
            counters,
            prewarmer,
        }
    }

    /// Runs a step after the durable write. Failures are logged and
    /// counted, never returned.
    async fn after_commit<T, F>(
        &self,
        step: &str,
        subject: impl Display,
        future: F,
    ) -> Option<T>
    where
        F: Future<Output = ::anyhow::Result<T>>,
    {
        match future.await {
            Ok(value) => Some(value),
            Err(err) => {
                ::log::warn!(
                    "{} for {} failed after commit: {:?}",
                    step,
                    subject,
                    err
                );
                metrics::count(
                    &self.metrics,
                    &format!("sync.step_failed.{}", step),
                );
                None
            }
        }
    }

    async fn load(&self, id: &EntityId) -> SyncResult<Entity> {
        self.stores
            .records
            .get(id)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("entity {} not found", id)))
    }

    /// Soft deleted entities read as missing.
    async fn load_active(&self, id: &EntityId) -> SyncResult<Entity> {
        let entity = self.load(id).await?;

        if !entity.is_active() {
            return Err(SyncError::not_found(format!("entity {} not found", id)));
        }

        Ok(entity)
    }

    fn derive_text_fields(&self, entity: &mut Entity, explicit: &[UserId]) {
        let title = entity.title().unwrap_or_default().to_string();
        let base = entity.base_mut();

        base.explicit_mentions = explicit.to_vec();
        base.mentioned_users = self.analyzer.collect_mentions(explicit, &base.body);
        base.is_profane = self.analyzer.is_profane(&title)
            || self.analyzer.is_profane(&base.body);
        base.has_document = !base.documents.is_empty();
    }

    async fn mirror_entity(&self, entity: &Entity) {
        self.after_commit(
            "search_mirror",
            entity.id(),
            mirror::mirror_search(self.stores.search.as_ref(), entity),
        )
        .await;

        self.after_commit(
            "entity_cache",
            entity.id(),
            mirror::refresh_entity_cache(self.stores.cache.as_ref(), entity),
        )
        .await;
    }

    /// Drops every namespace covering the entities and returns the
    /// prefixes that were dropped.
    async fn invalidate(
        &self,
        entities: &[&Entity],
        dimension: Option<&str>,
    ) -> Vec<String> {
        let mut prefixes: Vec<String> = vec![];

        for entity in entities {
            let found = self
                .after_commit(
                    "invalidate",
                    entity.id(),
                    async { self.canonicalizer.prefixes_for(entity, dimension) },
                )
                .await
                .unwrap_or_default();

            for prefix in found {
                if !prefixes.contains(&prefix) {
                    prefixes.push(prefix);
                }
            }
        }

        for prefix in &prefixes {
            if let Some(removed) = self
                .after_commit(
                    "invalidate",
                    prefix,
                    self.stores.cache.delete_by_prefix(prefix),
                )
                .await
            {
                ::log::debug!("invalidated {} entries under {}", removed, prefix);
            }
        }

        prefixes
    }

    /// Refills the community feed pages when their namespace was dropped.
    async fn refresh_feeds(&self, community: &CommunityId, dropped: &[String]) {
        let prefix = util::feed_prefix(community);

        if !dropped.contains(&prefix) {
            return;
        }

        for variant in [FeedVariant::Default, FeedVariant::Documents] {
            if let Some(pages) = self
                .after_commit(
                    "prewarm",
                    community,
                    self.prewarmer.prewarm(community, variant),
                )
                .await
            {
                metrics::count_by(
                    &self.metrics,
                    "prewarm.pages_written",
                    pages as i64,
                );
            }
        }
    }

    async fn bookmarker_prefixes(&self, id: &EntityId) -> ::anyhow::Result<Vec<String>> {
        let rows = self
            .stores
            .ledger
            .query(
                &LedgerFilter::kind(LedgerKind::Bookmark)
                    .subject(id)
                    .active(true),
                None,
            )
            .await?;

        Ok(rows
            .iter()
            .map(|x| util::bookmarks_prefix(&UserId::new(x.actor.clone())))
            .collect())
    }

    /// Drops the bookmark listings of every user holding the entity.
    async fn invalidate_bookmarks(&self, entity: &Entity) {
        let prefixes = self
            .after_commit("invalidate", entity.id(), self.bookmarker_prefixes(&entity.id()))
            .await
            .unwrap_or_default();

        for prefix in &prefixes {
            self.after_commit(
                "invalidate",
                prefix,
                self.stores.cache.delete_by_prefix(prefix),
            )
            .await;
        }
    }

    async fn display_name(&self, user: &UserId) -> String {
        match self.stores.users.get_users(&[user.clone()]).await {
            Ok(users) => users
                .get(user)
                .map(|x| x.display_name.clone())
                .unwrap_or_else(|| user.to_string()),
            Err(err) => {
                ::log::warn!("user lookup for {} failed: {:?}", user, err);
                user.to_string()
            }
        }
    }

    async fn notify(
        &self,
        actor: &UserId,
        event_kind: &str,
        category: &str,
        recipients: Vec<UserId>,
        title_template: &str,
        entity: &Entity,
    ) {
        let recipients: Vec<UserId> =
            recipients.into_iter().filter(|x| x != actor).collect();

        if recipients.is_empty() {
            return;
        }

        let event = NotificationEvent {
            event_kind: event_kind.to_string(),
            category: category.to_string(),
            recipients,
            title_template: title_template.to_string(),
            actor_name: self.display_name(actor).await,
            payload: ::serde_json::json!({
                "entityId": entity.id(),
                "type": entity.kind(),
                "communityId": entity.community_id(),
                "parentId": entity.parent_id(),
            }),
        };

        self.stores.notifier.notify(event);
    }

    async fn check_membership(
        &self,
        user: &UserId,
        community: &CommunityId,
    ) -> SyncResult<()> {
        if !self.settings.require_membership {
            return Ok(());
        }

        let key =
            LedgerKey::for_user(user, community, LedgerKind::CommunityMembership);

        match self.stores.ledger.get(&key).await? {
            Some(row) if row.active => Ok(()),
            _ => Err(SyncError::validation(format!(
                "{} is not a member of {}",
                user, community
            ))),
        }
    }

    async fn validate_draft(
        &self,
        identity: &Identity,
        draft: &EntityDraft,
    ) -> SyncResult<Option<Entity>> {
        if draft.body.trim().is_empty() {
            return Err(SyncError::validation("body must not be empty"));
        }

        if draft.community_id.as_str().is_empty() {
            return Err(SyncError::validation("communityId is required"));
        }

        let parent = match (draft.kind.parent_kind(), &draft.parent_id) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(SyncError::validation("questions have no parent"))
            }
            (Some(_), None) => {
                return Err(SyncError::validation(format!(
                    "{} requires a parentId",
                    draft.kind
                )))
            }
            (Some(parent_kind), Some(parent_id)) => {
                let parent = self.load_active(parent_id).await?;

                if parent.kind() != parent_kind {
                    return Err(SyncError::validation(format!(
                        "parent of {} must be {}",
                        draft.kind, parent_kind
                    )));
                }
                if parent.community_id() != &draft.community_id {
                    return Err(SyncError::validation(
                        "parent belongs to another community",
                    ));
                }
                if parent.status() == Status::Suspended {
                    return Err(SyncError::validation(
                        "cannot reply to a suspended entity",
                    ));
                }

                Some(parent)
            }
        };

        match (draft.kind, &draft.title) {
            (EntityKind::Question, Some(title)) if !title.trim().is_empty() => {}
            (EntityKind::Question, _) => {
                return Err(SyncError::validation("questions require a title"))
            }
            (_, Some(_)) => {
                return Err(SyncError::validation("only questions carry a title"))
            }
            (_, None) => {}
        }

        self.check_membership(&identity.user_id, &draft.community_id)
            .await?;

        Ok(parent)
    }

    pub async fn create(
        &self,
        identity: &Identity,
        draft: EntityDraft,
    ) -> SyncResult<Entity> {
        let parent = self.validate_draft(identity, &draft).await?;

        let now = ::chrono::Utc::now();
        let mut base = BaseFields::new(
            draft.community_id.clone(),
            identity.user_id.clone(),
            draft.body.clone(),
            now,
        );
        base.documents = draft.documents.clone();
        base.extra = draft.extra.clone();

        let mut entity = match (draft.kind, draft.parent_id) {
            (EntityKind::AnswerPost, Some(question_id)) => {
                Entity::AnswerPost(AnswerPost {
                    base,
                    question_id,
                    answer_post_replies: Default::default(),
                    answer_post_replies_count: 0,
                })
            }
            (EntityKind::AnswerPostReply, Some(answer_post_id)) => {
                Entity::AnswerPostReply(AnswerPostReply {
                    base,
                    answer_post_id,
                })
            }
            _ => Entity::Question(Question {
                base,
                title: draft.title.clone().unwrap_or_default(),
                answer_posts: Default::default(),
                answer_posts_count: 0,
            }),
        };
        self.derive_text_fields(&mut entity, &draft.mentioned_users);

        let entity = self.stores.records.put(&entity).await?;
        metrics::count(&self.metrics, &format!("sync.create.{}", entity.kind()));
        ::log::debug!("created {} {}", entity.kind(), entity.id());

        let mut updated_parent = None;
        if let (Some(key), Some(parent)) = (child_link_key(&entity), &parent) {
            let row = LedgerRow::new(key, now);
            self.after_commit("link", entity.id(), self.stores.ledger.upsert(&row))
                .await;

            updated_parent = self
                .after_commit(
                    "counters",
                    parent.id(),
                    self.counters.add_child(&parent.id(), entity.id()),
                )
                .await;
        }

        self.mirror_entity(&entity).await;

        let mut touched = vec![&entity];
        if let Some(parent) = updated_parent.as_ref().or(parent.as_ref()) {
            touched.push(parent);
        }
        let dropped = self.invalidate(&touched, None).await;
        self.refresh_feeds(entity.community_id(), &dropped).await;

        if let Some(parent) = &parent {
            let (event_kind, title_template) = match entity.kind() {
                EntityKind::AnswerPost => (
                    events::ANSWER_POST_CREATED,
                    "{actor} answered your question",
                ),
                _ => (
                    events::ANSWER_POST_REPLY_CREATED,
                    "{actor} replied to your answer",
                ),
            };
            self.notify(
                &identity.user_id,
                event_kind,
                "replies",
                vec![parent.created_by().clone()],
                title_template,
                &entity,
            )
            .await;
        }

        self.notify(
            &identity.user_id,
            events::MENTIONED,
            "mentions",
            entity.base().mentioned_users.clone(),
            "{actor} mentioned you",
            &entity,
        )
        .await;

        Ok(entity)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: &EntityId,
        patch: EntityPatch,
    ) -> SyncResult<Entity> {
        let mut entity = self.load_active(id).await?;

        if entity.created_by() != &identity.user_id {
            return Err(SyncError::auth("only the creator may edit"));
        }

        if let Some(body) = &patch.body {
            if body.trim().is_empty() {
                return Err(SyncError::validation("body must not be empty"));
            }
        }

        match (&mut entity, patch.title) {
            (Entity::Question(question), Some(title)) => {
                if title.trim().is_empty() {
                    return Err(SyncError::validation("title must not be empty"));
                }
                question.title = title;
            }
            (_, Some(_)) => {
                return Err(SyncError::validation("only questions carry a title"))
            }
            (_, None) => {}
        }

        let previous_mentions = entity.base().mentioned_users.clone();
        let explicit = patch
            .mentioned_users
            .unwrap_or_else(|| entity.base().explicit_mentions.clone());

        {
            let base = entity.base_mut();
            if let Some(body) = patch.body {
                base.body = body;
            }
            if let Some(documents) = patch.documents {
                base.documents = documents;
            }
            if let Some(extra) = patch.extra {
                base.extra = extra;
            }
            base.touch(&identity.user_id, ::chrono::Utc::now());
        }
        self.derive_text_fields(&mut entity, &explicit);

        let entity = self.stores.records.put(&entity).await?;
        metrics::count(&self.metrics, "sync.update");

        self.mirror_entity(&entity).await;
        self.invalidate_bookmarks(&entity).await;
        let dropped = self.invalidate(&[&entity], None).await;
        self.refresh_feeds(entity.community_id(), &dropped).await;

        let added: Vec<UserId> = entity
            .base()
            .mentioned_users
            .iter()
            .filter(|x| !previous_mentions.contains(x))
            .cloned()
            .collect();
        self.notify(
            &identity.user_id,
            events::MENTIONED,
            "mentions",
            added,
            "{actor} mentioned you",
            &entity,
        )
        .await;

        Ok(entity)
    }

    pub async fn soft_delete(
        &self,
        identity: &Identity,
        id: &EntityId,
    ) -> SyncResult<Entity> {
        let mut entity = self.load_active(id).await?;

        if entity.created_by() != &identity.user_id && !identity.moderator {
            return Err(SyncError::auth(
                "only the creator or a moderator may delete",
            ));
        }

        let now = ::chrono::Utc::now();
        entity.base_mut().is_active = false;
        entity.base_mut().touch(&identity.user_id, now);

        let entity = self.stores.records.put(&entity).await?;
        metrics::count(&self.metrics, "sync.delete");

        let mut parent = None;
        if let (Some(key), Some(parent_id)) =
            (child_link_key(&entity), entity.parent_id())
        {
            let mut row = LedgerRow::new(key, now);
            row.active = false;
            self.after_commit("link", entity.id(), self.stores.ledger.upsert(&row))
                .await;

            parent = self
                .after_commit(
                    "counters",
                    parent_id,
                    self.counters.remove_child(&parent_id, entity.id()),
                )
                .await;
        }

        self.mirror_entity(&entity).await;
        self.invalidate_bookmarks(&entity).await;

        let mut touched = vec![&entity];
        if let Some(parent) = &parent {
            touched.push(parent);
        }
        let dropped = self.invalidate(&touched, None).await;
        self.refresh_feeds(entity.community_id(), &dropped).await;

        Ok(entity)
    }

    /// Records the user's vote. Repeating the current direction is a
    /// conflict; flipping moves the total by two.
    pub async fn vote(
        &self,
        identity: &Identity,
        id: &EntityId,
        direction: VoteDirection,
    ) -> SyncResult<Entity> {
        let mut entity = self.load_active(id).await?;

        if entity.status() == Status::Suspended {
            return Err(SyncError::validation("cannot vote on a suspended entity"));
        }

        let key = LedgerKey::for_user(&identity.user_id, id, LedgerKind::Vote);
        let now = ::chrono::Utc::now();
        let existing = self.stores.ledger.get(&key).await?;

        let previous = existing
            .as_ref()
            .filter(|x| x.active)
            .and_then(|x| x.vote);

        if previous == Some(direction) {
            return Err(SyncError::conflict("vote already recorded"));
        }

        let delta = direction.delta() - previous.map_or(0, |x| x.delta());

        let mut row = existing.unwrap_or_else(|| LedgerRow::new(key, now));
        row.vote = Some(direction);
        row.active = true;
        row.updated_on = now;

        self.stores.ledger.upsert(&row).await?;
        metrics::count(&self.metrics, "sync.vote");
        ::log::debug!("{} voted {:?} on {}", identity.user_id, direction, id);

        let entity = match self
            .after_commit(
                "counters",
                id,
                self.counters.apply_vote_delta(id, delta),
            )
            .await
        {
            Some(updated) => updated,
            None => {
                entity.base_mut().votes += delta;
                entity
            }
        };

        let dropped = self.invalidate(&[&entity], None).await;
        self.refresh_feeds(entity.community_id(), &dropped).await;

        Ok(entity)
    }

    /// Files a report. Reporting one's own entity is allowed and counted
    /// like any other reporter.
    pub async fn report(
        &self,
        identity: &Identity,
        id: &EntityId,
    ) -> SyncResult<Entity> {
        let entity = self.load_active(id).await?;
        moderation::check_reportable(entity.status())?;

        let key = LedgerKey::for_user(&identity.user_id, id, LedgerKind::Report);
        let now = ::chrono::Utc::now();

        if let Some(row) = self.stores.ledger.get(&key).await? {
            if row.active {
                return Err(SyncError::conflict("entity already reported"));
            }
        }

        let row = LedgerRow::new(key, now);
        self.stores.ledger.upsert(&row).await?;
        metrics::count(&self.metrics, "sync.report");

        let mut entity = match self
            .after_commit(
                "counters",
                id,
                self.counters.recompute(id, CounterKind::Reports),
            )
            .await
        {
            Some(updated) => updated,
            None => {
                let mut entity = entity;
                entity
                    .base_mut()
                    .reported_by
                    .insert(identity.user_id.clone());
                entity
            }
        };

        let reporters = entity.base().reported_by.len();
        let transition = match moderation::on_report(
            entity.status(),
            reporters,
            &self.settings,
        ) {
            Ok(transition) => transition,
            Err(err) => {
                ::log::warn!("report transition for {} skipped: {}", id, err);
                return Ok(entity);
            }
        };

        if transition.is_change() {
            ::log::info!(
                "{} moved from {} to {} after {} reports",
                id,
                transition.from,
                transition.to,
                reporters
            );

            entity.base_mut().status = transition.to;
            entity.base_mut().touch(&identity.user_id, now);

            // projections follow the record store, never run ahead of it
            if let Some(stored) = self
                .after_commit(
                    "moderation",
                    id,
                    self.stores.records.put(&entity),
                )
                .await
            {
                entity = stored;
                self.mirror_entity(&entity).await;
            }
        }

        let dimension = if transition.is_change() {
            Some(fields::STATUS)
        } else {
            None
        };
        let dropped = self.invalidate(&[&entity], dimension).await;
        self.refresh_feeds(entity.community_id(), &dropped).await;

        if transition.suspended() {
            self.notify_suspended(&identity.user_id, &entity).await;
        }

        Ok(entity)
    }

    async fn notify_suspended(&self, actor: &UserId, entity: &Entity) {
        self.notify(
            actor,
            events::SUSPENDED,
            "moderation",
            vec![entity.created_by().clone()],
            "Your post was suspended",
            entity,
        )
        .await;
    }

    async fn purge_reports(&self, id: &EntityId) -> ::anyhow::Result<usize> {
        let rows = self
            .stores
            .ledger
            .query(&LedgerFilter::kind(LedgerKind::Report).subject(id), None)
            .await?;

        for row in &rows {
            self.stores.ledger.delete(&row.key()).await?;
        }

        Ok(rows.len())
    }

    pub async fn moderate(
        &self,
        identity: &Identity,
        id: &EntityId,
        action: ModerationAction,
    ) -> SyncResult<Entity> {
        if !identity.moderator {
            return Err(SyncError::auth("moderator role required"));
        }

        let mut entity = self.load_active(id).await?;
        let transition = moderation::on_moderator_action(entity.status(), action)?;

        entity.base_mut().status = transition.to;
        entity
            .base_mut()
            .touch(&identity.user_id, ::chrono::Utc::now());
        if action == ModerationAction::Reactivate {
            entity.base_mut().reported_by.clear();
        }

        let entity = self.stores.records.put(&entity).await?;
        metrics::count(&self.metrics, "sync.moderate");
        ::log::info!(
            "{} moved {} from {} to {}",
            identity.user_id,
            id,
            transition.from,
            transition.to
        );

        if action == ModerationAction::Reactivate {
            if let Some(purged) = self
                .after_commit("report_purge", id, self.purge_reports(id))
                .await
            {
                ::log::debug!("purged {} reports of {}", purged, id);
            }
        }

        self.mirror_entity(&entity).await;
        let dropped = self.invalidate(&[&entity], Some(fields::STATUS)).await;
        self.refresh_feeds(entity.community_id(), &dropped).await;

        if transition.suspended() {
            self.notify_suspended(&identity.user_id, &entity).await;
        }

        Ok(entity)
    }

    /// Sets the active flag of a ledger-only relation, rejecting a change
    /// to the state it already has.
    async fn set_relation(
        &self,
        key: LedgerKey,
        active: bool,
    ) -> SyncResult<LedgerRow> {
        let now = ::chrono::Utc::now();
        let existing = self.stores.ledger.get(&key).await?;

        let already = existing.as_ref().map_or(false, |x| x.active);
        if already == active {
            return Err(SyncError::conflict(format!(
                "{} already {}",
                key.kind.as_str(),
                if active { "set" } else { "removed" }
            )));
        }

        let mut row = existing.unwrap_or_else(|| LedgerRow::new(key, now));
        row.active = active;
        row.updated_on = now;

        self.stores.ledger.upsert(&row).await?;
        metrics::count(&self.metrics, &format!("sync.{}", row.kind.as_str()));

        Ok(row)
    }

    async fn set_bookmark(
        &self,
        identity: &Identity,
        id: &EntityId,
        active: bool,
    ) -> SyncResult<LedgerRow> {
        if active {
            self.load_active(id).await?;
        }

        let key = LedgerKey::for_user(&identity.user_id, id, LedgerKind::Bookmark);
        let row = self.set_relation(key, active).await?;

        let prefix = util::bookmarks_prefix(&identity.user_id);
        self.after_commit(
            "invalidate",
            &prefix,
            self.stores.cache.delete_by_prefix(&prefix),
        )
        .await;

        Ok(row)
    }

    pub async fn bookmark(
        &self,
        identity: &Identity,
        id: &EntityId,
    ) -> SyncResult<LedgerRow> {
        self.set_bookmark(identity, id, true).await
    }

    pub async fn unbookmark(
        &self,
        identity: &Identity,
        id: &EntityId,
    ) -> SyncResult<LedgerRow> {
        self.set_bookmark(identity, id, false).await
    }

    pub async fn join_community(
        &self,
        identity: &Identity,
        community: &CommunityId,
    ) -> SyncResult<LedgerRow> {
        let key = LedgerKey::for_user(
            &identity.user_id,
            community,
            LedgerKind::CommunityMembership,
        );
        self.set_relation(key, true).await
    }

    pub async fn leave_community(
        &self,
        identity: &Identity,
        community: &CommunityId,
    ) -> SyncResult<LedgerRow> {
        let key = LedgerKey::for_user(
            &identity.user_id,
            community,
            LedgerKind::CommunityMembership,
        );
        self.set_relation(key, false).await
    }
}
