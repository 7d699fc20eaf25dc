//! Denormalized counters derived from the ledger.
//!
//! Child sets and reporter sets are always rebuilt as sets and their sizes
//! assigned from the set, so duplicated or reordered events converge. Only
//! the scalar vote total takes a delta shortcut, and it falls back to a full
//! fold when the shortcut write fails.

use crate::mirror;
use crate::stores::Stores;
use ::agora_protocol::model::entity::{Entity, EntityKind};
use ::agora_protocol::model::ids::{EntityId, UserId};
use ::agora_protocol::model::ledger::{
    LedgerFilter, LedgerKey, LedgerKind, LedgerRow,
};
use ::anyhow::Context;
use ::std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterKind {
    Votes,
    Children,
    Reports,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CounterValue {
    Votes(i64),
    Children(BTreeSet<EntityId>),
    Reporters(BTreeSet<UserId>),
}

/// Ledger kind of the link rows pointing from children of `kind` to it.
pub fn child_link_kind(kind: EntityKind) -> Option<LedgerKind> {
    match kind.child_kind()? {
        EntityKind::AnswerPost => Some(LedgerKind::AnswerPost),
        EntityKind::AnswerPostReply => Some(LedgerKind::AnswerPostReply),
        EntityKind::Question => None,
    }
}

/// Link row recording that `child` belongs to its parent.
pub fn child_link_key(child: &Entity) -> Option<LedgerKey> {
    let parent = child.parent_id()?;
    let kind = match child.kind() {
        EntityKind::AnswerPost => LedgerKind::AnswerPost,
        EntityKind::AnswerPostReply => LedgerKind::AnswerPostReply,
        EntityKind::Question => return None,
    };

    Some(LedgerKey::new(
        child.id().to_string(),
        parent.to_string(),
        kind,
    ))
}

#[derive(Clone)]
pub struct CounterAggregator {
    stores: Stores,
}

impl CounterAggregator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    async fn load(&self, id: &EntityId) -> ::anyhow::Result<Entity> {
        self.stores
            .records
            .get(id)
            .await?
            .ok_or_else(|| ::anyhow::anyhow!("entity {} not found", id))
    }

    async fn active_rows(
        &self,
        kind: LedgerKind,
        subject: &EntityId,
    ) -> ::anyhow::Result<Vec<LedgerRow>> {
        self.stores
            .ledger
            .query(
                &LedgerFilter::kind(kind).subject(subject).active(true),
                None,
            )
            .await
    }

    /// Folds the ledger rows of one counter into a value.
    pub async fn fold(
        &self,
        entity: &Entity,
        counter: CounterKind,
    ) -> ::anyhow::Result<CounterValue> {
        let id = entity.id();

        match counter {
            CounterKind::Votes => {
                let total = self
                    .active_rows(LedgerKind::Vote, &id)
                    .await?
                    .iter()
                    .filter_map(|x| x.vote)
                    .map(|x| x.delta())
                    .sum();
                Ok(CounterValue::Votes(total))
            }
            CounterKind::Children => {
                let kind = child_link_kind(entity.kind()).ok_or_else(|| {
                    ::anyhow::anyhow!("{} has no children", entity.kind())
                })?;
                let mut children = BTreeSet::new();
                for row in self.active_rows(kind, &id).await? {
                    match row.actor.parse::<EntityId>() {
                        Ok(child) => {
                            children.insert(child);
                        }
                        Err(err) => ::log::warn!(
                            "skipping malformed link row {}: {}",
                            row.actor,
                            err
                        ),
                    }
                }
                Ok(CounterValue::Children(children))
            }
            CounterKind::Reports => {
                let reporters = self
                    .active_rows(LedgerKind::Report, &id)
                    .await?
                    .into_iter()
                    .map(|x| UserId::new(x.actor))
                    .collect();
                Ok(CounterValue::Reporters(reporters))
            }
        }
    }

    fn assign(entity: &mut Entity, value: CounterValue) {
        match value {
            CounterValue::Votes(total) => entity.base_mut().votes = total,
            CounterValue::Children(children) => {
                entity.replace_children(children);
            }
            CounterValue::Reporters(reporters) => {
                entity.base_mut().reported_by = reporters;
            }
        }
    }

    /// Persists the entity and refreshes its projections. Projection
    /// failures are logged since the record store already holds the value.
    async fn store(&self, entity: &Entity) -> ::anyhow::Result<Entity> {
        let entity = self.stores.records.put(entity).await?;

        if let Err(err) = mirror::mirror(
            self.stores.search.as_ref(),
            self.stores.cache.as_ref(),
            &entity,
        )
        .await
        {
            ::log::warn!("re-mirror of {} failed: {:?}", entity.id(), err);
        }

        Ok(entity)
    }

    /// Rebuilds one counter from scratch and writes it onto the entity.
    pub async fn recompute(
        &self,
        id: &EntityId,
        counter: CounterKind,
    ) -> ::anyhow::Result<Entity> {
        let mut entity = self.load(id).await?;
        let value = self.fold(&entity, counter).await?;

        ::log::debug!("recomputed {:?} of {}: {:?}", counter, id, value);

        Self::assign(&mut entity, value);
        self.store(&entity).await
    }

    /// Applies a vote delta relative to the stored total.
    pub async fn apply_vote_delta(
        &self,
        id: &EntityId,
        delta: i64,
    ) -> ::anyhow::Result<Entity> {
        let attempt = async {
            let mut entity = self.load(id).await?;
            entity.base_mut().votes += delta;
            self.store(&entity).await
        };

        match attempt.await {
            Ok(entity) => Ok(entity),
            Err(err) => {
                ::log::warn!(
                    "vote delta on {} failed, recomputing: {:?}",
                    id,
                    err
                );
                self.recompute(id, CounterKind::Votes)
                    .await
                    .context("vote recompute")
            }
        }
    }

    /// Called once the child's link row is in the ledger. The set is
    /// folded from the link rows, so concurrent adds cannot drop a child.
    pub async fn add_child(
        &self,
        parent: &EntityId,
        child: EntityId,
    ) -> ::anyhow::Result<Entity> {
        ::log::debug!("child {} linked to {}", child, parent);
        self.recompute(parent, CounterKind::Children).await
    }

    pub async fn remove_child(
        &self,
        parent: &EntityId,
        child: EntityId,
    ) -> ::anyhow::Result<Entity> {
        ::log::debug!("child {} unlinked from {}", child, parent);
        self.recompute(parent, CounterKind::Children).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{memory::MemoryRecordStore, RecordStore};
    use crate::test_utils::Harness;
    use ::agora_protocol::model::ledger::VoteDirection;
    use ::std::sync::atomic::{AtomicUsize, Ordering};
    use ::std::sync::Arc;
    use ::tokio::sync::Barrier;
    use ::agora_protocol::test_utils::{
        make_test_answer_post, make_test_question,
    };

    async fn link(harness: &Harness, child: &Entity, active: bool) {
        let key = child_link_key(child).unwrap();
        let mut row = LedgerRow::new(key, ::chrono::Utc::now());
        row.active = active;
        harness.stores.ledger.upsert(&row).await.unwrap();
    }

    #[tokio::test]
    async fn child_count_matches_deduplicated_ledger_set() {
        let harness = Harness::new();
        let question = make_test_question("c1", "u1");
        harness.stores.records.put(&question).await.unwrap();

        let answers: Vec<Entity> = (0..4)
            .map(|_| make_test_answer_post(&question, "u2"))
            .collect();

        // duplicates, a removal before its addition, then re-addition
        link(&harness, &answers[2], false).await;
        link(&harness, &answers[0], true).await;
        link(&harness, &answers[0], true).await;
        link(&harness, &answers[1], true).await;
        link(&harness, &answers[2], true).await;
        link(&harness, &answers[3], true).await;
        link(&harness, &answers[3], false).await;
        link(&harness, &answers[1], true).await;

        let counters = CounterAggregator::new(harness.stores.clone());
        let updated = counters
            .recompute(&question.id(), CounterKind::Children)
            .await
            .unwrap();

        let expected: BTreeSet<EntityId> =
            [answers[0].id(), answers[1].id(), answers[2].id()]
                .into_iter()
                .collect();
        assert_eq!(updated.children(), Some(&expected));
        assert_eq!(updated.children_count(), Some(3));

        let stored = harness
            .stores
            .records
            .get(&question.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.children_count(), Some(3));
    }

    #[tokio::test]
    async fn add_and_remove_child_are_idempotent() {
        let harness = Harness::new();
        let question = make_test_question("c1", "u1");
        harness.stores.records.put(&question).await.unwrap();
        let answer = make_test_answer_post(&question, "u2");

        let counters = CounterAggregator::new(harness.stores.clone());

        link(&harness, &answer, true).await;
        counters.add_child(&question.id(), answer.id()).await.unwrap();
        let updated = counters.add_child(&question.id(), answer.id()).await.unwrap();
        assert_eq!(updated.children_count(), Some(1));

        link(&harness, &answer, false).await;
        counters.remove_child(&question.id(), answer.id()).await.unwrap();
        let updated = counters
            .remove_child(&question.id(), answer.id())
            .await
            .unwrap();
        assert_eq!(updated.children_count(), Some(0));
        assert!(updated.children().unwrap().is_empty());
    }

    /// Holds the first two reads until both have arrived, so two writers
    /// work from the same stored parent.
    struct LockstepRecordStore {
        inner: MemoryRecordStore,
        barrier: Barrier,
        reads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RecordStore for LockstepRecordStore {
        async fn get(&self, id: &EntityId) -> ::anyhow::Result<Option<Entity>> {
            if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.barrier.wait().await;
            }
            self.inner.get(id).await
        }

        async fn put(&self, entity: &Entity) -> ::anyhow::Result<Entity> {
            self.inner.put(entity).await
        }
    }

    #[tokio::test]
    async fn concurrent_children_are_all_counted() {
        let harness = Harness::new();
        let records = Arc::new(LockstepRecordStore {
            inner: MemoryRecordStore::new(),
            barrier: Barrier::new(2),
            reads: AtomicUsize::new(0),
        });
        let stores = Stores {
            records: records.clone(),
            ..harness.stores.clone()
        };

        let question = make_test_question("c1", "u1");
        records.inner.put(&question).await.unwrap();
        let answers: Vec<Entity> = (0..3)
            .map(|_| make_test_answer_post(&question, "u2"))
            .collect();

        link(&harness, &answers[0], true).await;
        link(&harness, &answers[1], true).await;

        let counters = CounterAggregator::new(stores);
        let question_id = question.id();
        let (a, b) = ::tokio::join!(
            counters.add_child(&question_id, answers[0].id()),
            counters.add_child(&question_id, answers[1].id()),
        );
        a.unwrap();
        b.unwrap();

        let stored = records.inner.get(&question.id()).await.unwrap().unwrap();
        assert_eq!(stored.children_count(), Some(2));

        link(&harness, &answers[2], true).await;
        let updated = counters
            .add_child(&question.id(), answers[2].id())
            .await
            .unwrap();
        assert_eq!(updated.children_count(), Some(3));
    }

    #[tokio::test]
    async fn counter_update_re_mirrors_entity() {
        let harness = Harness::new();
        let question = make_test_question("c1", "u1");
        harness.stores.records.put(&question).await.unwrap();

        let mut row = LedgerRow::new(
            LedgerKey::for_user(&UserId::from("u2"), question.id(), LedgerKind::Vote),
            ::chrono::Utc::now(),
        );
        row.vote = Some(VoteDirection::Up);
        harness.stores.ledger.upsert(&row).await.unwrap();

        let counters = CounterAggregator::new(harness.stores.clone());
        counters
            .recompute(&question.id(), CounterKind::Votes)
            .await
            .unwrap();

        let document = harness
            .search
            .document("discussions", &question.id().to_string())
            .await
            .unwrap();
        assert_eq!(document["votes"], 1);

        let cached: Entity = crate::cache::util::get_json(
            harness.stores.cache.as_ref(),
            &crate::cache::util::entity_key(&question.id()),
        )
        .await
        .unwrap();
        assert_eq!(cached.base().votes, 1);
    }

    #[tokio::test]
    async fn vote_delta_falls_back_to_recompute_when_write_fails() {
        let harness = Harness::new();
        let question = make_test_question("c1", "u1");
        harness.stores.records.put(&question).await.unwrap();

        for (user, direction) in [("u2", VoteDirection::Up), ("u3", VoteDirection::Up)] {
            let mut row = LedgerRow::new(
                LedgerKey::for_user(&UserId::from(user), question.id(), LedgerKind::Vote),
                ::chrono::Utc::now(),
            );
            row.vote = Some(direction);
            harness.stores.ledger.upsert(&row).await.unwrap();
        }

        harness.records.fail_puts(1);

        let counters = CounterAggregator::new(harness.stores.clone());
        let updated = counters.apply_vote_delta(&question.id(), 1).await.unwrap();

        assert_eq!(updated.base().votes, 2);
    }
}
