use ::agora_protocol::model::{entity::dedup_mentions, ids::UserId};

const MENTION_PATTERN: &str = r"(?:^|[^\w@])@([A-Za-z0-9_][A-Za-z0-9_.-]*)";

/// Derives the profanity flag and the mention list from post text.
#[derive(Clone)]
pub struct TextAnalyzer {
    profanity: Option<::regex::Regex>,
    mentions: ::regex::Regex,
}

impl TextAnalyzer {
    /// Profanity is a case insensitive whole word match against `words`.
    pub fn new(words: &[String]) -> ::anyhow::Result<Self> {
        let alternatives: Vec<String> = words
            .iter()
            .map(|x| x.trim())
            .filter(|x| !x.is_empty())
            .map(::regex::escape)
            .collect();

        let profanity = if alternatives.is_empty() {
            None
        } else {
            Some(::regex::Regex::new(&format!(
                r"(?i)\b(?:{})\b",
                alternatives.join("|")
            ))?)
        };

        Ok(Self {
            profanity,
            mentions: ::regex::Regex::new(MENTION_PATTERN)?,
        })
    }

    pub fn is_profane(&self, text: &str) -> bool {
        self.profanity.as_ref().map_or(false, |x| x.is_match(text))
    }

    /// Explicit mentions first, then `@handle` tokens from the body, without
    /// repeats.
    pub fn collect_mentions(&self, explicit: &[UserId], body: &str) -> Vec<UserId> {
        let handles = self.mentions.captures_iter(body).filter_map(|x| {
            x.get(1)
                .map(|m| m.as_str().trim_end_matches(['.', '-']))
                .filter(|m| !m.is_empty())
                .map(UserId::from)
        });

        dedup_mentions(explicit.iter().cloned().chain(handles))
    }
}
