use std::fmt;
use std::fmt::{Debug, Formatter};

use crate::session::classifier::normalize;

/// A security question with its expected answer, stored normalized.
#[derive(Clone, Eq, PartialEq)]
pub struct SecurityQuestion {
    question: String,
    answer: String
}

impl SecurityQuestion {
    pub fn new(question: impl Into<String>, answer: &str) -> Self {
        Self {
            question: question.into(),
            answer: normalize(answer)
        }
    }

    pub fn text(&self) -> &str {
        &self.question
    }

    pub fn accepts(&self, reply: &str) -> bool {
        !self.answer.is_empty() && normalize(reply) == self.answer
    }
}

impl Debug for SecurityQuestion {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("SecurityQuestion")
            .field("question", &self.question)
            .field("answer", &"<redacted>")
            .finish()
    }
}

/// The security questions registered for a user.
///
/// Questions are asked one at a time in registration order, and every one of them
/// must be answered correctly before ownership counts as proven.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SecurityChallenge {
    questions: Vec<SecurityQuestion>
}

impl SecurityChallenge {
    pub fn new(question: impl Into<String>, answer: &str) -> Self {
        Self { questions: vec![SecurityQuestion::new(question, answer)] }
    }

    /// Appends a question that must also be answered.
    pub fn with_question(mut self, question: impl Into<String>, answer: &str) -> Self {
        self.questions.push(SecurityQuestion::new(question, answer));
        self
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// The question at `index`, counted from zero in asking order.
    pub fn get(&self, index: usize) -> Option<&SecurityQuestion> {
        self.questions.get(index)
    }
}
