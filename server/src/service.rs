use crate::error::{SyncError, SyncResult};
use crate::identity::{Identity, IdentityVerifier};
use crate::reads::Reader;
use crate::synchronizer::Synchronizer;
use ::agora_protocol::model::entity::{Entity, EntityKind, Status};
use ::agora_protocol::model::feed::{FeedPage, ReportStats};
use ::agora_protocol::model::fields;
use ::agora_protocol::model::ids::{CommunityId, EntityId};
use ::agora_protocol::model::ledger::{LedgerRow, VoteDirection};
use ::agora_protocol::model::payload::{
    EntityDraft, EntityPatch, ModerationAction,
};
use ::agora_protocol::query::{FilterValue, Query};
use ::agora_protocol::response::ApiResponse;
use ::std::sync::Arc;

fn respond<T>(result: SyncResult<T>) -> ApiResponse<T> {
    match result {
        Ok(value) => ApiResponse::success(value),
        Err(err) => err.into_response(),
    }
}

/// Pins a query to active entities and to statuses shown in public feeds.
/// Listings of inactive, reported only or suspended entities need the
/// moderator role.
fn restrict_to_public(mut query: Query) -> SyncResult<Query> {
    match query.filters.get(fields::IS_ACTIVE) {
        None | Some(FilterValue::Bool(true)) => {}
        Some(_) => {
            return Err(SyncError::auth("inactive entities are moderator only"))
        }
    }
    query
        .filters
        .insert(fields::IS_ACTIVE.to_string(), FilterValue::Bool(true));

    let visible = [Status::Active.as_str(), Status::Reported.as_str()];
    let statuses: Vec<&str> = match query.filters.get(fields::STATUS) {
        None => visible.to_vec(),
        Some(FilterValue::Text(x)) => vec![x.as_str()],
        Some(FilterValue::AnyOf(values)) => values.iter().map(String::as_str).collect(),
        Some(FilterValue::Bool(_)) => {
            return Err(SyncError::validation("status filter must be text"))
        }
    };

    let public = statuses.contains(&Status::Active.as_str())
        && statuses.iter().all(|x| visible.contains(x));
    if !public {
        return Err(SyncError::auth("moderation listings are moderator only"));
    }

    let statuses: Vec<String> = statuses.into_iter().map(String::from).collect();
    query
        .filters
        .insert(fields::STATUS.to_string(), FilterValue::AnyOf(statuses));

    Ok(query)
}

/// The exposed operations. Mutations verify the caller's token before
/// touching any store and every call answers with the response envelope.
#[derive(Clone)]
pub struct AgoraService {
    synchronizer: Synchronizer,
    reader: Reader,
    verifier: Arc<dyn IdentityVerifier>,
}

impl AgoraService {
    pub fn new(
        synchronizer: Synchronizer,
        reader: Reader,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            synchronizer,
            reader,
            verifier,
        }
    }

    fn authenticate(&self, token: Option<&str>) -> SyncResult<Identity> {
        match token.map(str::trim) {
            Some(token) if !token.is_empty() => self.verifier.verify(token),
            _ => Err(SyncError::auth("missing token")),
        }
    }

    fn authenticate_moderator(&self, token: Option<&str>) -> SyncResult<Identity> {
        let identity = self.authenticate(token)?;

        if !identity.moderator {
            return Err(SyncError::auth("moderator role required"));
        }

        Ok(identity)
    }

    pub async fn create(
        &self,
        token: Option<&str>,
        draft: EntityDraft,
    ) -> ApiResponse<Entity> {
        let result = async {
            let identity = self.authenticate(token)?;
            self.synchronizer.create(&identity, draft).await
        }
        .await;

        match result {
            Ok(entity) => ApiResponse::created(entity),
            Err(err) => err.into_response(),
        }
    }

    pub async fn get(&self, id: &EntityId) -> ApiResponse<Entity> {
        respond(self.reader.get_entity(id).await)
    }

    pub async fn update(
        &self,
        token: Option<&str>,
        id: &EntityId,
        patch: EntityPatch,
    ) -> ApiResponse<Entity> {
        respond(
            async {
                let identity = self.authenticate(token)?;
                self.synchronizer.update(&identity, id, patch).await
            }
            .await,
        )
    }

    pub async fn delete(
        &self,
        token: Option<&str>,
        id: &EntityId,
    ) -> ApiResponse<Entity> {
        respond(
            async {
                let identity = self.authenticate(token)?;
                self.synchronizer.soft_delete(&identity, id).await
            }
            .await,
        )
    }

    pub async fn vote(
        &self,
        token: Option<&str>,
        id: &EntityId,
        direction: VoteDirection,
    ) -> ApiResponse<Entity> {
        respond(
            async {
                let identity = self.authenticate(token)?;
                self.synchronizer.vote(&identity, id, direction).await
            }
            .await,
        )
    }

    pub async fn report(
        &self,
        token: Option<&str>,
        id: &EntityId,
    ) -> ApiResponse<Entity> {
        respond(
            async {
                let identity = self.authenticate(token)?;
                self.synchronizer.report(&identity, id).await
            }
            .await,
        )
    }

    pub async fn moderate(
        &self,
        token: Option<&str>,
        id: &EntityId,
        action: ModerationAction,
    ) -> ApiResponse<Entity> {
        respond(
            async {
                let identity = self.authenticate_moderator(token)?;
                self.synchronizer.moderate(&identity, id, action).await
            }
            .await,
        )
    }

    pub async fn bookmark(
        &self,
        token: Option<&str>,
        id: &EntityId,
        active: bool,
    ) -> ApiResponse<LedgerRow> {
        respond(
            async {
                let identity = self.authenticate(token)?;
                if active {
                    self.synchronizer.bookmark(&identity, id).await
                } else {
                    self.synchronizer.unbookmark(&identity, id).await
                }
            }
            .await,
        )
    }

    pub async fn bookmarks(
        &self,
        token: Option<&str>,
        kind: EntityKind,
        page: u32,
    ) -> ApiResponse<FeedPage> {
        respond(
            async {
                let identity = self.authenticate(token)?;
                self.reader.bookmarks(&identity.user_id, kind, page).await
            }
            .await,
        )
    }

    pub async fn membership(
        &self,
        token: Option<&str>,
        community: &CommunityId,
        active: bool,
    ) -> ApiResponse<LedgerRow> {
        respond(
            async {
                let identity = self.authenticate(token)?;
                if active {
                    self.synchronizer.join_community(&identity, community).await
                } else {
                    self.synchronizer.leave_community(&identity, community).await
                }
            }
            .await,
        )
    }

    /// Bookmark listings are private and only reachable through
    /// `bookmarks`. Callers without the moderator role only see active
    /// entities in a publicly visible status.
    pub async fn query(
        &self,
        token: Option<&str>,
        query: Query,
    ) -> ApiResponse<FeedPage> {
        respond(
            async {
                if query.filters.contains_key(fields::BOOKMARKED_BY) {
                    return Err(SyncError::validation(
                        "bookmarkedBy is not a public filter",
                    ));
                }

                let moderator = match token {
                    Some(_) => self.authenticate(token)?.moderator,
                    None => false,
                };
                let query = if moderator {
                    query
                } else {
                    restrict_to_public(query)?
                };

                self.reader.query(query).await
            }
            .await,
        )
    }

    pub async fn community_feed(
        &self,
        community: &CommunityId,
        page: u32,
        documents_only: bool,
    ) -> ApiResponse<FeedPage> {
        respond(
            self.reader
                .community_feed(community, page, documents_only)
                .await,
        )
    }

    pub async fn global_feed(&self, page: u32) -> ApiResponse<FeedPage> {
        respond(self.reader.global_feed(page).await)
    }

    pub async fn children(&self, id: &EntityId, page: u32) -> ApiResponse<FeedPage> {
        respond(self.reader.children(id, page).await)
    }

    pub async fn moderation_queue(
        &self,
        token: Option<&str>,
        community: &CommunityId,
        page: u32,
    ) -> ApiResponse<FeedPage> {
        respond(
            async {
                self.authenticate_moderator(token)?;
                self.reader.moderation_queue(community, page).await
            }
            .await,
        )
    }

    pub async fn report_stats(
        &self,
        token: Option<&str>,
        community: &CommunityId,
    ) -> ApiResponse<ReportStats> {
        respond(
            async {
                self.authenticate_moderator(token)?;
                self.reader.report_stats(community).await
            }
            .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;
    use ::agora_protocol::response::status;
    use ::agora_protocol::test_utils::make_test_draft;

    #[tokio::test]
    async fn mutations_without_valid_token_touch_nothing() {
        let harness = Harness::new();
        let service = harness.service();
        harness.records.fail_all(true);
        harness.ledger.fail_all(true);

        let draft = make_test_draft(EntityKind::Question, "c1", None);
        let id = EntityId::new();

        let responses = vec![
            service.create(None, draft.clone()).await.status_code,
            service.create(Some(""), draft.clone()).await.status_code,
            service.create(Some("forged.token"), draft).await.status_code,
            service.vote(None, &id, VoteDirection::Up).await.status_code,
            service.report(None, &id).await.status_code,
            service.delete(None, &id).await.status_code,
            service.bookmark(None, &id, true).await.status_code,
        ];

        assert!(responses.iter().all(|x| *x == 401));
        assert!(harness.cache.keys().await.is_empty());
    }

    #[tokio::test]
    async fn envelope_carries_status_and_result() {
        let harness = Harness::new();
        let service = harness.service();
        let token = harness.token(&Identity::user("u1"));

        let created = service
            .create(
                Some(&token),
                make_test_draft(EntityKind::Question, "c1", None),
            )
            .await;
        assert_eq!(created.status_code, 201);
        assert_eq!(created.status, status::CREATED);
        let question = created.result.unwrap();

        let voted = service
            .vote(Some(&token), &question.id(), VoteDirection::Up)
            .await;
        assert_eq!(voted.status_code, 200);

        let again = service
            .vote(Some(&token), &question.id(), VoteDirection::Up)
            .await;
        assert_eq!(again.status_code, 409);
        assert_eq!(again.status, status::ALREADY_DONE);
        assert!(again.result.is_none());
        assert!(again.message.is_some());

        let missing = service.get(&EntityId::new()).await;
        assert_eq!(missing.status_code, 404);
    }

    #[tokio::test]
    async fn infrastructure_failure_hides_details() {
        let harness = Harness::new();
        let service = harness.service();
        let token = harness.token(&Identity::user("u1"));
        harness.records.fail_all(true);

        let response = service
            .create(
                Some(&token),
                make_test_draft(EntityKind::Question, "c1", None),
            )
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.message.as_deref(), Some("internal error"));
    }

    #[tokio::test]
    async fn moderator_only_operations() {
        let harness = Harness::new();
        let service = harness.service();
        let user = harness.token(&Identity::user("u1"));
        let moderator = harness.token(&Identity::moderator("m1"));
        let community = CommunityId::from("c1");

        assert_eq!(
            service.report_stats(Some(&user), &community).await.status_code,
            401
        );
        assert_eq!(
            service
                .moderation_queue(Some(&user), &community, 1)
                .await
                .status_code,
            401
        );

        let stats = service.report_stats(Some(&moderator), &community).await;
        assert_eq!(stats.status_code, 200);
        assert_eq!(stats.result.unwrap().total, 0);
    }

    #[tokio::test]
    async fn bookmark_filter_is_not_public() {
        let service = Harness::new().service();

        let response = service
            .query(
                None,
                Query::new(EntityKind::Question)
                    .filter(fields::BOOKMARKED_BY, "u1"),
            )
            .await;

        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn public_query_hides_deleted_and_moderation_listings() {
        let harness = Harness::new();
        let service = harness.service();
        let author = harness.token(&Identity::user("u1"));
        let moderator = harness.token(&Identity::moderator("m1"));

        let kept = service
            .create(Some(&author), make_test_draft(EntityKind::Question, "c1", None))
            .await
            .result
            .unwrap();
        let deleted = service
            .create(Some(&author), make_test_draft(EntityKind::Question, "c1", None))
            .await
            .result
            .unwrap();
        service.delete(Some(&author), &deleted.id()).await;
        assert_eq!(service.get(&deleted.id()).await.status_code, 404);

        let inactive = Query::new(EntityKind::Question)
            .filter(fields::COMMUNITY_ID, "c1")
            .filter(fields::IS_ACTIVE, false);
        assert_eq!(service.query(None, inactive.clone()).await.status_code, 401);
        assert_eq!(
            service
                .query(Some(&author), inactive.clone())
                .await
                .status_code,
            401
        );
        let listed = service.query(Some(&moderator), inactive).await;
        assert_eq!(listed.result.unwrap().total_count, 1);

        let everything = service
            .query(
                None,
                Query::new(EntityKind::Question).filter(fields::COMMUNITY_ID, "c1"),
            )
            .await
            .result
            .unwrap();
        assert_eq!(everything.total_count, 1);
        assert_eq!(everything.rows[0].entity.id(), kept.id());

        service.report(Some(&author), &kept.id()).await;
        let queue = Query::new(EntityKind::Question)
            .filter(fields::COMMUNITY_ID, "c1")
            .filter(fields::IS_ACTIVE, true)
            .filter(fields::STATUS, "reported")
            .sort(fields::UPDATED_ON, ::agora_protocol::query::Direction::Desc);
        assert_eq!(service.query(None, queue.clone()).await.status_code, 401);
        assert!(harness.cache.keys_with_prefix("modq:c1:").await.is_empty());

        let suspended = Query::new(EntityKind::Question)
            .filter(fields::COMMUNITY_ID, "c1")
            .filter(fields::STATUS, "suspended");
        assert_eq!(service.query(None, suspended).await.status_code, 401);

        let queue = service.query(Some(&moderator), queue).await;
        assert_eq!(queue.result.unwrap().total_count, 1);
    }
}
