//! Attempt state machines.

use serde::{Deserialize, Serialize};

/// Status of a user's relationship with a quiz.
///
/// ```text
/// NotStarted ──► InProgress ──┬──► Passed
///                             └──► Failed ──► Passed
/// ```
///
/// Passed is sticky: a later failing grade never moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UserQuizStatus {
    #[default]
    NotStarted,
    InProgress,
    Passed,
    Failed,
}

impl UserQuizStatus {
    /// Status after a grade with the given pass flag.
    pub fn after_grade(self, is_passed: bool) -> Self {
        match (self, is_passed) {
            (UserQuizStatus::Passed, _) => UserQuizStatus::Passed,
            (_, true) => UserQuizStatus::Passed,
            (_, false) => UserQuizStatus::Failed,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, UserQuizStatus::Passed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserQuizStatus::NotStarted => "NotStarted",
            UserQuizStatus::InProgress => "InProgress",
            UserQuizStatus::Passed => "Passed",
            UserQuizStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for UserQuizStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single attempt.
///
/// ```text
/// InProgress ──► Pending ──► Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResultStatus {
    /// Opened, answers not yet submitted.
    #[default]
    InProgress,
    /// Submitted and waiting for a grade.
    Pending,
    /// Graded (terminal).
    Completed,
}

impl ResultStatus {
    pub fn can_submit(&self) -> bool {
        matches!(self, ResultStatus::InProgress)
    }

    pub fn can_grade(&self) -> bool {
        matches!(self, ResultStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ResultStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::InProgress => "InProgress",
            ResultStatus::Pending => "Pending",
            ResultStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
