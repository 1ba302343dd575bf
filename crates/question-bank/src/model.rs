//! Question bank data model.

use common::{ChoiceId, CourseId, QuestionId, QuizId};
use messaging::QuestionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizStatus {
    Hidden,
    Published,
    Archived,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Hidden => "Hidden",
            QuizStatus::Published => "Published",
            QuizStatus::Archived => "Archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Hidden" => Some(QuizStatus::Hidden),
            "Published" => Some(QuizStatus::Published),
            "Archived" => Some(QuizStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionStatus {
    Active,
    Archived,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Active => "Active",
            QuestionStatus::Archived => "Archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Active" => Some(QuestionStatus::Active),
            "Archived" => Some(QuestionStatus::Archived),
            _ => None,
        }
    }
}

/// A question's place in a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question_id: QuestionId,
    /// Replaces the question's own point value within this quiz.
    pub point_override: Option<f64>,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub course_id: CourseId,
    pub name: String,
    pub total_marks: f64,
    pub duration_minutes: Option<i32>,
    pub status: QuizStatus,
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn new(course_id: CourseId, name: impl Into<String>) -> Self {
        Self {
            id: QuizId::new(),
            course_id,
            name: name.into(),
            total_marks: 0.0,
            duration_minutes: None,
            status: QuizStatus::Published,
            questions: Vec::new(),
        }
    }

    /// Appends a question at the next order index.
    pub fn with_question(mut self, question_id: QuestionId, point_override: Option<f64>) -> Self {
        let order_index = self.questions.len() as i32;
        self.questions.push(QuizQuestion {
            question_id,
            point_override,
            order_index,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionChoice {
    pub id: ChoiceId,
    pub text: String,
    pub is_correct: bool,
}

impl QuestionChoice {
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id: ChoiceId::new(),
            text: text.into(),
            is_correct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub course_id: CourseId,
    pub text: String,
    pub question_type: QuestionType,
    pub points: f64,
    pub status: QuestionStatus,
    /// Choices for MultipleChoice and TrueFalse questions.
    pub choices: Vec<QuestionChoice>,
    /// Stored answer for ShortAnswer questions.
    pub correct_answer: Option<String>,
}

impl Question {
    pub fn multiple_choice(
        course_id: CourseId,
        text: impl Into<String>,
        points: f64,
        choices: Vec<QuestionChoice>,
    ) -> Self {
        Self::with_choices(course_id, text, QuestionType::MultipleChoice, points, choices)
    }

    /// A TrueFalse question with a "True" and a "False" choice.
    pub fn true_false(course_id: CourseId, text: impl Into<String>, points: f64, answer: bool) -> Self {
        let choices = vec![
            QuestionChoice::new("True", answer),
            QuestionChoice::new("False", !answer),
        ];
        Self::with_choices(course_id, text, QuestionType::TrueFalse, points, choices)
    }

    pub fn short_answer(
        course_id: CourseId,
        text: impl Into<String>,
        points: f64,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            id: QuestionId::new(),
            course_id,
            text: text.into(),
            question_type: QuestionType::ShortAnswer,
            points,
            status: QuestionStatus::Active,
            choices: Vec::new(),
            correct_answer: Some(correct_answer.into()),
        }
    }

    fn with_choices(
        course_id: CourseId,
        text: impl Into<String>,
        question_type: QuestionType,
        points: f64,
        choices: Vec<QuestionChoice>,
    ) -> Self {
        Self {
            id: QuestionId::new(),
            course_id,
            text: text.into(),
            question_type,
            points,
            status: QuestionStatus::Active,
            choices,
            correct_answer: None,
        }
    }

    /// Finds a choice by its text.
    pub fn choice(&self, text: &str) -> Option<&QuestionChoice> {
        self.choices.iter().find(|c| c.text == text)
    }
}
