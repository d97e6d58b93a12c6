//! REST payloads for the quiz content collaborator surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dao::models::{QuestionEntity, QuestionKind, QuizEntity};

/// Payload used to seed quiz content.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQuizRequest {
    /// Display title of the quiz.
    pub title: String,
    /// Questions in play order.
    pub questions: Vec<QuestionInput>,
}

impl Validate for CreateQuizRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.title.trim().is_empty() {
            let mut err = ValidationError::new("title_empty");
            err.message = Some("Quiz title must not be empty".into());
            errors.add("title", err);
        }

        if self.questions.is_empty() {
            let mut err = ValidationError::new("questions_empty");
            err.message = Some("A quiz requires at least one question".into());
            errors.add("questions", err);
        }

        for question in &self.questions {
            if let Err(question_errors) = question.validate() {
                errors.merge_self("questions", Err(question_errors));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Incoming question definition.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    /// Question text.
    pub text: String,
    /// Answer options; empty or omitted marks a boolean question.
    #[serde(default)]
    pub options: Vec<String>,
    /// Stored correct answer.
    pub correct_answer: String,
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.text.trim().is_empty() {
            let mut err = ValidationError::new("question_text_empty");
            err.message = Some("Question text must not be empty".into());
            errors.add("text", err);
        }

        if self.options.is_empty() {
            // Boolean question: the stored answer must be true or false.
            if !self.correct_answer.eq_ignore_ascii_case("true")
                && !self.correct_answer.eq_ignore_ascii_case("false")
            {
                let mut err = ValidationError::new("boolean_answer");
                err.message =
                    Some("Boolean questions must use `true` or `false` as the answer".into());
                errors.add("correctAnswer", err);
            }
        } else if !self.options.contains(&self.correct_answer) {
            let mut err = ValidationError::new("answer_not_an_option");
            err.message = Some("Correct answer must be one of the listed options".into());
            errors.add("correctAnswer", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<QuestionInput> for QuestionEntity {
    fn from(value: QuestionInput) -> Self {
        let kind = if value.options.is_empty() {
            QuestionKind::Boolean
        } else {
            QuestionKind::MultipleChoice {
                options: value.options,
            }
        };
        Self {
            id: Uuid::new_v4(),
            text: value.text,
            kind,
            correct_answer: value.correct_answer,
        }
    }
}

/// Quiz content returned by `GET /quizzes/{id}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizDetail {
    /// Quiz identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Number of questions in the quiz.
    pub question_count: usize,
    /// Questions in play order, without the correct answers.
    pub questions: Vec<QuestionDto>,
}

/// Player-facing question view. The correct answer is deliberately absent;
/// it reaches clients only through `challenge_answer_result`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    /// Question identifier.
    pub id: Uuid,
    /// Question text.
    pub text: String,
    /// Options for multiple-choice questions; empty for boolean ones.
    pub options: Vec<String>,
}

impl From<QuizEntity> for QuizDetail {
    fn from(value: QuizEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            question_count: value.questions.len(),
            questions: value
                .questions
                .into_iter()
                .map(|question| QuestionDto {
                    id: question.id,
                    text: question.text,
                    options: match question.kind {
                        QuestionKind::MultipleChoice { options } => options,
                        QuestionKind::Boolean => Vec::new(),
                    },
                })
                .collect(),
        }
    }
}
