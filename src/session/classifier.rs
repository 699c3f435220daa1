use std::fmt;
use std::fmt::{Debug, Formatter};

use crate::session::SecurityQuestion;

const AFFIRMATIVE: [&str; 2] = ["yes", "y"];
const NEGATIVE: [&str; 2] = ["no", "n"];
const EXPLANATION_MARKERS: [&str; 3] = ["why", "reason", "flag"];

/// What a user turn asks the session to do.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReplyIntent {
    Confirm,
    Deny,
    AnswerChallenge,
    Explain,
    Unrecognized
}

type Predicate = fn(&str, Option<&SecurityQuestion>) -> bool;

#[derive(Clone, Copy)]
struct ReplyRule {
    intent: ReplyIntent,
    predicate: Predicate
}

static CONFIRMATION_RULES: [ReplyRule; 4] = [
    ReplyRule { intent: ReplyIntent::Confirm, predicate: is_affirmative },
    ReplyRule { intent: ReplyIntent::Deny, predicate: is_negative },
    ReplyRule { intent: ReplyIntent::Explain, predicate: asks_for_reason },
    ReplyRule { intent: ReplyIntent::Unrecognized, predicate: anything }
];

static CHALLENGE_RULES: [ReplyRule; 4] = [
    ReplyRule { intent: ReplyIntent::Deny, predicate: is_negative },
    ReplyRule { intent: ReplyIntent::AnswerChallenge, predicate: answers_challenge },
    ReplyRule { intent: ReplyIntent::Explain, predicate: asks_for_reason },
    ReplyRule { intent: ReplyIntent::Unrecognized, predicate: anything }
];

/// Ordered `(predicate, intent)` rules evaluated top to bottom; the first match wins.
#[derive(Clone)]
pub struct ReplyClassifier {
    rules: &'static [ReplyRule]
}

impl Debug for ReplyClassifier {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("ReplyClassifier")
            .field("order", &self.order())
            .finish()
    }
}

impl ReplyClassifier {
    /// YES / NO confirmation of ownership.
    pub fn confirmation() -> Self {
        Self { rules: &CONFIRMATION_RULES }
    }

    /// Ownership proven by answering a security question. A bare YES proves nothing here.
    pub fn challenge() -> Self {
        Self { rules: &CHALLENGE_RULES }
    }

    /// Intent of `text`, where `question` is the security question currently being asked.
    pub fn classify(&self, text: &str, question: Option<&SecurityQuestion>) -> ReplyIntent {
        let normalized = normalize(text);

        self.rules.iter()
            .find(|rule| (rule.predicate)(&normalized, question))
            .map(|rule| rule.intent)
            .unwrap_or(ReplyIntent::Unrecognized)
    }

    /// Intents in the order they are tried.
    pub fn order(&self) -> Vec<ReplyIntent> {
        self.rules.iter().map(|rule| rule.intent).collect()
    }
}

/// Trims, lower-cases and collapses inner whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_affirmative(text: &str, _: Option<&SecurityQuestion>) -> bool {
    AFFIRMATIVE.contains(&text)
}

fn is_negative(text: &str, _: Option<&SecurityQuestion>) -> bool {
    NEGATIVE.contains(&text)
}

fn answers_challenge(text: &str, question: Option<&SecurityQuestion>) -> bool {
    question.is_some_and(|question| question.accepts(text))
}

fn asks_for_reason(text: &str, _: Option<&SecurityQuestion>) -> bool {
    EXPLANATION_MARKERS.iter().any(|marker| text.contains(marker))
}

fn anything(_: &str, _: Option<&SecurityQuestion>) -> bool {
    true
}
