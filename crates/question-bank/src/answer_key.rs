//! Answer keys: the part of a quiz the grading engine needs.

use std::collections::{BTreeSet, HashMap};

use common::{ChoiceId, QuestionId, QuizId};
use messaging::QuestionType;

use crate::{Question, QuestionBankError, Quiz, Result};

/// The correct answer for one question.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedAnswer {
    MultipleChoice(BTreeSet<ChoiceId>),
    TrueFalse(BTreeSet<ChoiceId>),
    /// Already case-folded and trimmed.
    ShortAnswer(String),
}

impl ExpectedAnswer {
    pub fn question_type(&self) -> QuestionType {
        match self {
            ExpectedAnswer::MultipleChoice(_) => QuestionType::MultipleChoice,
            ExpectedAnswer::TrueFalse(_) => QuestionType::TrueFalse,
            ExpectedAnswer::ShortAnswer(_) => QuestionType::ShortAnswer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyEntry {
    pub question_id: QuestionId,
    /// Points for this question within the quiz, override applied.
    pub points: f64,
    pub expected: ExpectedAnswer,
}

/// Ordered answer key of a quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerKey {
    pub quiz_id: QuizId,
    entries: Vec<KeyEntry>,
}

/// Normalizes free text for comparison.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

impl AnswerKey {
    /// Builds a key from a quiz and the questions it references.
    ///
    /// Questions are ordered by the quiz's `order_index`. Questions that
    /// the quiz does not reference are ignored.
    pub fn build(quiz: &Quiz, questions: &[Question]) -> Result<Self> {
        let by_id: HashMap<QuestionId, &Question> = questions.iter().map(|q| (q.id, q)).collect();

        let mut slots: Vec<_> = quiz.questions.iter().collect();
        slots.sort_by_key(|slot| slot.order_index);

        let mut entries = Vec::with_capacity(slots.len());
        for slot in slots {
            let question = by_id.get(&slot.question_id).ok_or(
                QuestionBankError::MissingQuestion {
                    quiz_id: quiz.id,
                    question_id: slot.question_id,
                },
            )?;

            entries.push(KeyEntry {
                question_id: question.id,
                points: slot.point_override.unwrap_or(question.points),
                expected: expected_answer(question)?,
            });
        }

        Ok(Self {
            quiz_id: quiz.id,
            entries,
        })
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    pub fn entry(&self, question_id: QuestionId) -> Option<&KeyEntry> {
        self.entries.iter().find(|e| e.question_id == question_id)
    }

    /// Sum of the point values of every question in the quiz.
    pub fn total_marks(&self) -> f64 {
        self.entries.iter().map(|e| e.points).sum()
    }
}

fn expected_answer(question: &Question) -> Result<ExpectedAnswer> {
    let correct_choices = || -> BTreeSet<ChoiceId> {
        question
            .choices
            .iter()
            .filter(|c| c.is_correct)
            .map(|c| c.id)
            .collect()
    };

    match question.question_type {
        QuestionType::MultipleChoice => Ok(ExpectedAnswer::MultipleChoice(correct_choices())),
        QuestionType::TrueFalse => Ok(ExpectedAnswer::TrueFalse(correct_choices())),
        QuestionType::ShortAnswer => match question.correct_answer.as_deref() {
            Some(text) => Ok(ExpectedAnswer::ShortAnswer(normalize_text(text))),
            None => Err(QuestionBankError::MalformedQuestion {
                question_id: question.id,
                reason: "short answer question has no stored answer".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuestionChoice;
    use common::CourseId;

    #[test]
    fn orders_by_index_and_applies_override() {
        let course = CourseId::new();
        let q1 = Question::short_answer(course, "Capital of France?", 5.0, "Paris");
        let q2 = Question::true_false(course, "Rust has a GC", 2.0, false);

        let mut quiz = Quiz::new(course, "Mixed");
        quiz.questions = vec![
            crate::QuizQuestion {
                question_id: q1.id,
                point_override: Some(7.0),
                order_index: 2,
            },
            crate::QuizQuestion {
                question_id: q2.id,
                point_override: None,
                order_index: 1,
            },
        ];

        let key = AnswerKey::build(&quiz, &[q1.clone(), q2.clone()]).unwrap();
        let ids: Vec<_> = key.entries().iter().map(|e| e.question_id).collect();
        assert_eq!(ids, vec![q2.id, q1.id]);
        assert_eq!(key.entry(q1.id).unwrap().points, 7.0);
        assert_eq!(key.total_marks(), 9.0);
        assert_eq!(
            key.entry(q1.id).unwrap().expected,
            ExpectedAnswer::ShortAnswer("paris".to_string())
        );
    }

    #[test]
    fn missing_question_is_an_error() {
        let course = CourseId::new();
        let quiz = Quiz::new(course, "Broken").with_question(QuestionId::new(), None);

        let err = AnswerKey::build(&quiz, &[]).unwrap_err();
        assert!(matches!(err, QuestionBankError::MissingQuestion { .. }));
    }

    #[test]
    fn short_answer_without_stored_answer_is_malformed() {
        let course = CourseId::new();
        let mut question = Question::short_answer(course, "?", 1.0, "x");
        question.correct_answer = None;
        let quiz = Quiz::new(course, "Quiz").with_question(question.id, None);

        let err = AnswerKey::build(&quiz, &[question]).unwrap_err();
        assert!(matches!(err, QuestionBankError::MalformedQuestion { .. }));
    }

    #[test]
    fn collects_every_correct_choice() {
        let course = CourseId::new();
        let question = Question::multiple_choice(
            course,
            "Pick primes",
            3.0,
            vec![
                QuestionChoice::new("2", true),
                QuestionChoice::new("3", true),
                QuestionChoice::new("4", false),
            ],
        );
        let quiz = Quiz::new(course, "Primes").with_question(question.id, None);
        let key = AnswerKey::build(&quiz, std::slice::from_ref(&question)).unwrap();

        let expected: BTreeSet<_> = [question.choice("2").unwrap().id, question.choice("3").unwrap().id]
            .into_iter()
            .collect();
        assert_eq!(
            key.entries()[0].expected,
            ExpectedAnswer::MultipleChoice(expected)
        );
    }
}
