pub mod fields {
    //! Document field names shared by the search index mirror, the
    //! canonical cache shapes and ad-hoc query criteria.

    pub const ID: &str = "id";
    pub const TYPE: &str = "type";
    pub const STATUS: &str = "status";
    pub const IS_ACTIVE: &str = "isActive";
    pub const IS_PROFANE: &str = "isProfane";
    pub const HAS_DOCUMENT: &str = "hasDocument";
    pub const COMMUNITY_ID: &str = "communityId";
    pub const CREATED_BY: &str = "createdBy";
    pub const CREATED_ON: &str = "createdOn";
    pub const UPDATED_ON: &str = "updatedOn";
    pub const QUESTION_ID: &str = "questionId";
    pub const ANSWER_POST_ID: &str = "answerPostId";
    pub const VOTES: &str = "votes";
    pub const BOOKMARKED_BY: &str = "bookmarkedBy";
}

pub mod ids {
    #[derive(
        ::serde::Serialize,
        ::serde::Deserialize,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Clone,
        Copy,
        Debug,
    )]
    #[serde(transparent)]
    pub struct EntityId(::uuid::Uuid);

    impl EntityId {
        /// Ids are UUIDv7 so that lexical order follows creation order.
        pub fn new() -> EntityId {
            EntityId(::uuid::Uuid::now_v7())
        }

        pub fn from_uuid(uuid: ::uuid::Uuid) -> EntityId {
            EntityId(uuid)
        }

        pub fn as_uuid(&self) -> &::uuid::Uuid {
            &self.0
        }
    }

    impl Default for EntityId {
        fn default() -> Self {
            EntityId::new()
        }
    }

    impl ::std::fmt::Display for EntityId {
        fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl ::std::str::FromStr for EntityId {
        type Err = ::anyhow::Error;

        fn from_str(s: &str) -> ::anyhow::Result<EntityId> {
            Ok(EntityId(::uuid::Uuid::parse_str(s)?))
        }
    }

    macro_rules! string_id {
        ($name:ident) => {
            #[derive(
                ::serde::Serialize,
                ::serde::Deserialize,
                PartialEq,
                Eq,
                PartialOrd,
                Ord,
                Hash,
                Clone,
                Debug,
            )]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> $name {
                    $name(value.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl ::std::fmt::Display for $name {
                fn fmt(
                    &self,
                    f: &mut ::std::fmt::Formatter<'_>,
                ) -> ::std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> $name {
                    $name(value.to_string())
                }
            }
        };
    }

    string_id!(UserId);
    string_id!(CommunityId);
}

pub mod entity {
    use crate::model::ids::{CommunityId, EntityId, UserId};
    use ::chrono::{DateTime, Utc};
    use ::std::collections::{BTreeMap, BTreeSet};

    #[derive(
        ::serde::Serialize,
        ::serde::Deserialize,
        PartialEq,
        Eq,
        Hash,
        Clone,
        Copy,
        Debug,
    )]
    #[serde(rename_all = "snake_case")]
    pub enum EntityKind {
        Question,
        AnswerPost,
        AnswerPostReply,
    }

    impl EntityKind {
        pub fn as_str(&self) -> &'static str {
            match self {
                EntityKind::Question => "question",
                EntityKind::AnswerPost => "answer_post",
                EntityKind::AnswerPostReply => "answer_post_reply",
            }
        }

        /// Search index collection holding documents of this kind.
        pub fn collection(&self) -> &'static str {
            match self {
                EntityKind::Question => "discussions",
                EntityKind::AnswerPost => "answer_posts",
                EntityKind::AnswerPostReply => "answer_post_replies",
            }
        }

        pub fn from_str(value: &str) -> Option<EntityKind> {
            match value {
                "question" => Some(EntityKind::Question),
                "answer_post" => Some(EntityKind::AnswerPost),
                "answer_post_reply" => Some(EntityKind::AnswerPostReply),
                _ => None,
            }
        }

        /// The kind a parent of this kind must have.
        pub fn parent_kind(&self) -> Option<EntityKind> {
            match self {
                EntityKind::Question => None,
                EntityKind::AnswerPost => Some(EntityKind::Question),
                EntityKind::AnswerPostReply => Some(EntityKind::AnswerPost),
            }
        }

        pub fn child_kind(&self) -> Option<EntityKind> {
            match self {
                EntityKind::Question => Some(EntityKind::AnswerPost),
                EntityKind::AnswerPost => Some(EntityKind::AnswerPostReply),
                EntityKind::AnswerPostReply => None,
            }
        }
    }

    impl ::std::fmt::Display for EntityKind {
        fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(
        ::serde::Serialize,
        ::serde::Deserialize,
        PartialEq,
        Eq,
        Hash,
        Clone,
        Copy,
        Debug,
    )]
    #[serde(rename_all = "snake_case")]
    pub enum Status {
        Active,
        Reported,
        Suspended,
    }

    impl Status {
        pub fn as_str(&self) -> &'static str {
            match self {
                Status::Active => "active",
                Status::Reported => "reported",
                Status::Suspended => "suspended",
            }
        }
    }

    impl ::std::fmt::Display for Status {
        fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Fields every entity type carries.
    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct BaseFields {
        pub id: EntityId,
        pub status: Status,
        pub is_active: bool,
        pub community_id: CommunityId,
        pub created_by: UserId,
        pub updated_by: UserId,
        #[serde(with = "::chrono::serde::ts_milliseconds")]
        pub created_on: DateTime<Utc>,
        #[serde(with = "::chrono::serde::ts_milliseconds")]
        pub updated_on: DateTime<Utc>,
        pub body: String,
        #[serde(default)]
        pub mentioned_users: Vec<UserId>,
        /// Mentions given by the author, without those parsed from the
        /// body. Edits rebuild `mentioned_users` from these.
        #[serde(default)]
        pub explicit_mentions: Vec<UserId>,
        #[serde(default)]
        pub votes: i64,
        #[serde(default)]
        pub reported_by: BTreeSet<UserId>,
        #[serde(default)]
        pub is_profane: bool,
        #[serde(default)]
        pub documents: Vec<String>,
        #[serde(default)]
        pub has_document: bool,
        /// Platform specific attributes the core carries but never
        /// interprets.
        #[serde(default)]
        pub extra: BTreeMap<String, ::serde_json::Value>,
    }

    impl BaseFields {
        pub fn new(
            community_id: CommunityId,
            created_by: UserId,
            body: String,
            now: DateTime<Utc>,
        ) -> BaseFields {
            BaseFields {
                id: EntityId::new(),
                status: Status::Active,
                is_active: true,
                community_id,
                updated_by: created_by.clone(),
                created_by,
                created_on: now,
                updated_on: now,
                body,
                mentioned_users: vec![],
                explicit_mentions: vec![],
                votes: 0,
                reported_by: BTreeSet::new(),
                is_profane: false,
                documents: vec![],
                has_document: false,
                extra: BTreeMap::new(),
            }
        }

        pub fn touch(&mut self, by: &UserId, now: DateTime<Utc>) {
            self.updated_by = by.clone();
            self.updated_on = now;
        }
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Question {
        #[serde(flatten)]
        pub base: BaseFields,
        pub title: String,
        #[serde(default)]
        pub answer_posts: BTreeSet<EntityId>,
        #[serde(default)]
        pub answer_posts_count: u64,
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct AnswerPost {
        #[serde(flatten)]
        pub base: BaseFields,
        pub question_id: EntityId,
        #[serde(default)]
        pub answer_post_replies: BTreeSet<EntityId>,
        #[serde(default)]
        pub answer_post_replies_count: u64,
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct AnswerPostReply {
        #[serde(flatten)]
        pub base: BaseFields,
        pub answer_post_id: EntityId,
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum Entity {
        Question(Question),
        AnswerPost(AnswerPost),
        AnswerPostReply(AnswerPostReply),
    }

    impl Entity {
        pub fn base(&self) -> &BaseFields {
            match self {
                Entity::Question(x) => &x.base,
                Entity::AnswerPost(x) => &x.base,
                Entity::AnswerPostReply(x) => &x.base,
            }
        }

        pub fn base_mut(&mut self) -> &mut BaseFields {
            match self {
                Entity::Question(x) => &mut x.base,
                Entity::AnswerPost(x) => &mut x.base,
                Entity::AnswerPostReply(x) => &mut x.base,
            }
        }

        pub fn kind(&self) -> EntityKind {
            match self {
                Entity::Question(_) => EntityKind::Question,
                Entity::AnswerPost(_) => EntityKind::AnswerPost,
                Entity::AnswerPostReply(_) => EntityKind::AnswerPostReply,
            }
        }

        pub fn id(&self) -> EntityId {
            self.base().id
        }

        pub fn status(&self) -> Status {
            self.base().status
        }

        pub fn is_active(&self) -> bool {
            self.base().is_active
        }

        pub fn community_id(&self) -> &CommunityId {
            &self.base().community_id
        }

        pub fn created_by(&self) -> &UserId {
            &self.base().created_by
        }

        pub fn parent_id(&self) -> Option<EntityId> {
            match self {
                Entity::Question(_) => None,
                Entity::AnswerPost(x) => Some(x.question_id),
                Entity::AnswerPostReply(x) => Some(x.answer_post_id),
            }
        }

        pub fn children(&self) -> Option<&BTreeSet<EntityId>> {
            match self {
                Entity::Question(x) => Some(&x.answer_posts),
                Entity::AnswerPost(x) => Some(&x.answer_post_replies),
                Entity::AnswerPostReply(_) => None,
            }
        }

        pub fn children_count(&self) -> Option<u64> {
            match self {
                Entity::Question(x) => Some(x.answer_posts_count),
                Entity::AnswerPost(x) => Some(x.answer_post_replies_count),
                Entity::AnswerPostReply(_) => None,
            }
        }

        /// Replaces the child set and assigns its cardinality. Returns false
        /// for kinds without children.
        pub fn replace_children(&mut self, children: BTreeSet<EntityId>) -> bool {
            match self {
                Entity::Question(x) => {
                    x.answer_posts_count = children.len() as u64;
                    x.answer_posts = children;
                    true
                }
                Entity::AnswerPost(x) => {
                    x.answer_post_replies_count = children.len() as u64;
                    x.answer_post_replies = children;
                    true
                }
                Entity::AnswerPostReply(_) => false,
            }
        }

        pub fn title(&self) -> Option<&str> {
            match self {
                Entity::Question(x) => Some(&x.title),
                _ => None,
            }
        }

        pub fn to_document(&self) -> ::anyhow::Result<::serde_json::Value> {
            Ok(::serde_json::to_value(self)?)
        }

        pub fn from_document(
            document: ::serde_json::Value,
        ) -> ::anyhow::Result<Entity> {
            Ok(::serde_json::from_value(document)?)
        }
    }

    /// Removes repeated users, keeping the position of the first
    /// occurrence.
    pub fn dedup_mentions(users: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
        let mut seen = ::std::collections::HashSet::new();
        let mut result = vec![];

        for user in users {
            if seen.insert(user.clone()) {
                result.push(user);
            }
        }

        result
    }
}

pub mod ledger {
    use crate::model::ids::UserId;
    use ::chrono::{DateTime, Utc};

    #[derive(
        ::serde::Serialize,
        ::serde::Deserialize,
        PartialEq,
        Eq,
        Hash,
        Clone,
        Copy,
        Debug,
    )]
    #[serde(rename_all = "snake_case")]
    pub enum LedgerKind {
        Vote,
        Report,
        Bookmark,
        CommunityMembership,
        /// Link rows from a child post (actor) to its parent (subject).
        AnswerPost,
        AnswerPostReply,
    }

    impl LedgerKind {
        pub fn as_str(&self) -> &'static str {
            match self {
                LedgerKind::Vote => "vote",
                LedgerKind::Report => "report",
                LedgerKind::Bookmark => "bookmark",
                LedgerKind::CommunityMembership => "community_membership",
                LedgerKind::AnswerPost => "answer_post",
                LedgerKind::AnswerPostReply => "answer_post_reply",
            }
        }

        pub fn from_str(value: &str) -> ::anyhow::Result<LedgerKind> {
            match value {
                "vote" => Ok(LedgerKind::Vote),
                "report" => Ok(LedgerKind::Report),
                "bookmark" => Ok(LedgerKind::Bookmark),
                "community_membership" => Ok(LedgerKind::CommunityMembership),
                "answer_post" => Ok(LedgerKind::AnswerPost),
                "answer_post_reply" => Ok(LedgerKind::AnswerPostReply),
                _ => ::anyhow::bail!("unknown ledger kind {}", value),
            }
        }
    }

    #[derive(
        ::serde::Serialize,
        ::serde::Deserialize,
        PartialEq,
        Eq,
        Hash,
        Clone,
        Copy,
        Debug,
    )]
    #[serde(rename_all = "snake_case")]
    pub enum VoteDirection {
        Up,
        Down,
    }

    impl VoteDirection {
        pub fn delta(&self) -> i64 {
            match self {
                VoteDirection::Up => 1,
                VoteDirection::Down => -1,
            }
        }

        pub fn as_i16(&self) -> i16 {
            self.delta() as i16
        }

        pub fn from_i16(value: i16) -> Option<VoteDirection> {
            match value {
                1 => Some(VoteDirection::Up),
                -1 => Some(VoteDirection::Down),
                _ => None,
            }
        }
    }

    #[derive(PartialEq, Eq, Hash, Clone, Debug)]
    pub struct LedgerKey {
        /// The acting user, or the child post id for link rows.
        pub actor: String,
        /// The entity or community the action targets.
        pub subject: String,
        pub kind: LedgerKind,
    }

    impl LedgerKey {
        pub fn new(
            actor: impl Into<String>,
            subject: impl Into<String>,
            kind: LedgerKind,
        ) -> LedgerKey {
            LedgerKey {
                actor: actor.into(),
                subject: subject.into(),
                kind,
            }
        }

        pub fn for_user(
            user: &UserId,
            subject: impl ::std::fmt::Display,
            kind: LedgerKind,
        ) -> LedgerKey {
            LedgerKey::new(user.as_str(), subject.to_string(), kind)
        }
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    pub struct LedgerRow {
        pub actor: String,
        pub subject: String,
        pub kind: LedgerKind,
        pub vote: Option<VoteDirection>,
        pub active: bool,
        pub created_on: DateTime<Utc>,
        pub updated_on: DateTime<Utc>,
    }

    impl LedgerRow {
        pub fn new(key: LedgerKey, now: DateTime<Utc>) -> LedgerRow {
            LedgerRow {
                actor: key.actor,
                subject: key.subject,
                kind: key.kind,
                vote: None,
                active: true,
                created_on: now,
                updated_on: now,
            }
        }

        pub fn key(&self) -> LedgerKey {
            LedgerKey::new(self.actor.clone(), self.subject.clone(), self.kind)
        }
    }

    /// Property filter for ledger queries. `None` matches anything.
    #[derive(Clone, Debug)]
    pub struct LedgerFilter {
        pub kind: LedgerKind,
        pub actor: Option<String>,
        pub subject: Option<String>,
        pub active: Option<bool>,
    }

    impl LedgerFilter {
        pub fn kind(kind: LedgerKind) -> LedgerFilter {
            LedgerFilter {
                kind,
                actor: None,
                subject: None,
                active: None,
            }
        }

        pub fn subject(mut self, subject: impl ::std::fmt::Display) -> Self {
            self.subject = Some(subject.to_string());
            self
        }

        pub fn actor(mut self, actor: impl ::std::fmt::Display) -> Self {
            self.actor = Some(actor.to_string());
            self
        }

        pub fn active(mut self, active: bool) -> Self {
            self.active = Some(active);
            self
        }

        pub fn matches(&self, row: &LedgerRow) -> bool {
            row.kind == self.kind
                && self.actor.as_ref().map_or(true, |x| *x == row.actor)
                && self.subject.as_ref().map_or(true, |x| *x == row.subject)
                && self.active.map_or(true, |x| x == row.active)
        }
    }
}

pub mod user {
    use crate::model::ids::UserId;

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct UserSummary {
        pub id: UserId,
        pub display_name: String,
        pub avatar_url: Option<String>,
    }
}

pub mod feed {
    use crate::model::entity::Entity;
    use crate::model::ids::CommunityId;
    use crate::model::user::UserSummary;

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct FeedRow {
        pub entity: Entity,
        pub creator: Option<UserSummary>,
        #[serde(default)]
        pub mentioned_users: Vec<UserSummary>,
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct FeedPage {
        pub rows: Vec<FeedRow>,
        pub page: u32,
        pub page_size: u32,
        pub total_count: u64,
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct ReportStats {
        pub community_id: CommunityId,
        pub active: u64,
        pub reported: u64,
        pub suspended: u64,
        pub total: u64,
    }
}

pub mod payload {
    //! Request bodies of the exposed operations.

    use crate::model::entity::EntityKind;
    use crate::model::ids::{CommunityId, EntityId, UserId};
    use crate::model::ledger::VoteDirection;
    use ::std::collections::BTreeMap;

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct EntityDraft {
        #[serde(rename = "type")]
        pub kind: EntityKind,
        pub community_id: CommunityId,
        #[serde(default)]
        pub parent_id: Option<EntityId>,
        #[serde(default)]
        pub title: Option<String>,
        pub body: String,
        #[serde(default)]
        pub mentioned_users: Vec<UserId>,
        #[serde(default)]
        pub documents: Vec<String>,
        #[serde(default)]
        pub extra: BTreeMap<String, ::serde_json::Value>,
    }

    #[derive(
        ::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug, Default,
    )]
    #[serde(rename_all = "camelCase")]
    pub struct EntityPatch {
        #[serde(default)]
        pub title: Option<String>,
        #[serde(default)]
        pub body: Option<String>,
        #[serde(default)]
        pub mentioned_users: Option<Vec<UserId>>,
        #[serde(default)]
        pub documents: Option<Vec<String>>,
        #[serde(default)]
        pub extra: Option<BTreeMap<String, ::serde_json::Value>>,
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    pub struct VoteRequest {
        pub direction: VoteDirection,
    }

    #[derive(
        ::serde::Serialize, ::serde::Deserialize, PartialEq, Eq, Clone, Copy, Debug,
    )]
    #[serde(rename_all = "snake_case")]
    pub enum ModerationAction {
        Suspend,
        Reactivate,
    }

    #[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
    pub struct ModerationRequest {
        pub action: ModerationAction,
    }
}

#[cfg(test)]
pub mod tests {
    use super::entity::*;
    use super::ids::*;

    #[test]
    fn entity_document_is_tagged_and_camel_case() {
        let question = crate::test_utils::make_test_question("c1", "u1");
        let document = question.to_document().unwrap();

        assert_eq!(document["type"], "question");
        assert_eq!(document["communityId"], "c1");
        assert_eq!(document["isActive"], true);
        assert_eq!(document["status"], "active");
        assert_eq!(document["answerPostsCount"], 0);
        assert!(document["createdOn"].is_i64());

        let parsed = Entity::from_document(document).unwrap();
        assert_eq!(parsed.id(), question.id());
        assert_eq!(parsed.kind(), EntityKind::Question);
    }

    #[test]
    fn replace_children_assigns_cardinality() {
        let mut question = crate::test_utils::make_test_question("c1", "u1");
        let children: ::std::collections::BTreeSet<EntityId> =
            (0..3).map(|_| EntityId::new()).collect();

        assert!(question.replace_children(children.clone()));
        assert_eq!(question.children(), Some(&children));
        assert_eq!(question.children_count(), Some(3));

        let mut reply = crate::test_utils::make_test_reply(
            &crate::test_utils::make_test_answer_post(&question, "u2"),
            "u3",
        );
        assert!(!reply.replace_children(children));
    }

    #[test]
    fn dedup_mentions_keeps_first_occurrence() {
        let users = vec![
            UserId::from("b"),
            UserId::from("a"),
            UserId::from("b"),
            UserId::from("c"),
            UserId::from("a"),
        ];

        assert_eq!(
            dedup_mentions(users),
            vec![UserId::from("b"), UserId::from("a"), UserId::from("c")]
        );
    }

    #[test]
    fn entity_ids_are_time_ordered() {
        let first = EntityId::new();
        let second = EntityId::new();
        assert!(first < second);
        assert_eq!(first.to_string().parse::<EntityId>().unwrap(), first);
    }
}
