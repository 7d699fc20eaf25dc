use crate::model::entity::{
    AnswerPost, AnswerPostReply, BaseFields, Entity, EntityKind, Question,
};
use crate::model::ids::{CommunityId, EntityId, UserId};
use crate::model::payload::EntityDraft;
use ::rand::Rng;

fn make_test_base(community: &str, user: &str) -> BaseFields {
    BaseFields::new(
        CommunityId::from(community),
        UserId::from(user),
        format!("body {}", ::rand::thread_rng().gen::<u32>()),
        ::chrono::Utc::now(),
    )
}

pub fn make_test_question(community: &str, user: &str) -> Entity {
    Entity::Question(Question {
        base: make_test_base(community, user),
        title: "title".to_string(),
        answer_posts: Default::default(),
        answer_posts_count: 0,
    })
}

pub fn make_test_answer_post(question: &Entity, user: &str) -> Entity {
    Entity::AnswerPost(AnswerPost {
        base: make_test_base(question.community_id().as_str(), user),
        question_id: question.id(),
        answer_post_replies: Default::default(),
        answer_post_replies_count: 0,
    })
}

pub fn make_test_reply(answer_post: &Entity, user: &str) -> Entity {
    Entity::AnswerPostReply(AnswerPostReply {
        base: make_test_base(answer_post.community_id().as_str(), user),
        answer_post_id: answer_post.id(),
    })
}

pub fn make_test_draft(
    kind: EntityKind,
    community: &str,
    parent_id: Option<EntityId>,
) -> EntityDraft {
    EntityDraft {
        kind,
        community_id: CommunityId::from(community),
        parent_id,
        title: match kind {
            EntityKind::Question => Some("title".to_string()),
            _ => None,
        },
        body: "body".to_string(),
        mentioned_users: vec![],
        documents: vec![],
        extra: Default::default(),
    }
}
