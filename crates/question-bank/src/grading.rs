//! The grading engine.
//!
//! Grading is a pure function of an answer key and a list of answers. It
//! performs no I/O and never mutates the key, so the same input always
//! produces the same [`GradingReport`].

use std::collections::{BTreeSet, HashMap, HashSet};

use common::{QuestionId, QuizId};
use messaging::{Answer, GradedQuestion};
use serde::{Deserialize, Serialize};

use crate::answer_key::{AnswerKey, ExpectedAnswer, normalize_text};

/// Percentage at or above which an attempt passes, unless configured.
pub const DEFAULT_PASSING_PERCENTAGE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradingPolicy {
    pub passing_percentage: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            passing_percentage: DEFAULT_PASSING_PERCENTAGE,
        }
    }
}

impl GradingPolicy {
    pub fn new(passing_percentage: f64) -> Self {
        Self { passing_percentage }
    }

    pub fn is_passing(&self, percentage_score: f64) -> bool {
        percentage_score >= self.passing_percentage
    }
}

/// Outcome of grading one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingReport {
    pub quiz_id: QuizId,
    /// One entry per quiz question, in quiz order.
    pub graded_questions: Vec<GradedQuestion>,
    pub total_points_earned: f64,
    pub total_marks: f64,
    pub percentage_score: f64,
    pub is_passed: bool,
    /// Answered questions that are not part of the quiz.
    pub unknown_questions: Vec<QuestionId>,
}

impl GradingReport {
    pub fn correct_count(&self) -> usize {
        self.graded_questions.iter().filter(|q| q.is_correct).count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GradingEngine {
    policy: GradingPolicy,
}

impl GradingEngine {
    pub fn new(policy: GradingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> GradingPolicy {
        self.policy
    }

    pub fn grade(&self, key: &AnswerKey, answers: &[Answer]) -> GradingReport {
        // First answer per question wins.
        let mut by_question: HashMap<QuestionId, &Answer> = HashMap::new();
        let mut unknown_questions = Vec::new();
        let mut seen_unknown = HashSet::new();
        for answer in answers {
            let question_id = answer.question_id();
            if key.entry(question_id).is_none() {
                if seen_unknown.insert(question_id) {
                    unknown_questions.push(question_id);
                }
                continue;
            }
            by_question.entry(question_id).or_insert(answer);
        }

        let graded_questions: Vec<GradedQuestion> = key
            .entries()
            .iter()
            .map(|entry| {
                let is_correct = by_question
                    .get(&entry.question_id)
                    .is_some_and(|answer| is_correct(&entry.expected, answer));
                GradedQuestion {
                    question_id: entry.question_id,
                    is_correct,
                    points_earned: if is_correct { entry.points } else { 0.0 },
                    max_points: entry.points,
                }
            })
            .collect();

        let total_points_earned: f64 = graded_questions.iter().map(|q| q.points_earned).sum();
        let total_marks = key.total_marks();
        let percentage_score = if total_marks > 0.0 {
            total_points_earned / total_marks * 100.0
        } else {
            0.0
        };

        GradingReport {
            quiz_id: key.quiz_id,
            graded_questions,
            total_points_earned,
            total_marks,
            percentage_score,
            is_passed: self.policy.is_passing(percentage_score),
            unknown_questions,
        }
    }
}

fn is_correct(expected: &ExpectedAnswer, answer: &Answer) -> bool {
    match (expected, answer) {
        (
            ExpectedAnswer::MultipleChoice(correct),
            Answer::MultipleChoice {
                selected_choice_ids,
                ..
            },
        )
        | (
            ExpectedAnswer::TrueFalse(correct),
            Answer::TrueFalse {
                selected_choice_ids,
                ..
            },
        ) => {
            let selected: BTreeSet<_> = selected_choice_ids.iter().copied().collect();
            !selected.is_empty() && selected == *correct
        }
        (ExpectedAnswer::ShortAnswer(correct), Answer::ShortAnswer { text_answer, .. }) => {
            let given = normalize_text(text_answer);
            !given.is_empty() && given == *correct
        }
        _ => false,
    }
}
