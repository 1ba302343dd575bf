use common::CourseId;
use criterion::{Criterion, criterion_group, criterion_main};
use messaging::Answer;
use question_bank::{AnswerKey, GradingEngine, Question, QuestionChoice, Quiz};

fn build_quiz(question_count: usize) -> (AnswerKey, Vec<Answer>) {
    let course = CourseId::new();
    let mut quiz = Quiz::new(course, "Bench quiz");
    let mut questions = Vec::with_capacity(question_count);
    let mut answers = Vec::with_capacity(question_count);

    for i in 0..question_count {
        let question = match i % 3 {
            0 => Question::multiple_choice(
                course,
                format!("Q{i}"),
                2.0,
                vec![
                    QuestionChoice::new("A", true),
                    QuestionChoice::new("B", false),
                    QuestionChoice::new("C", true),
                ],
            ),
            1 => Question::true_false(course, format!("Q{i}"), 1.0, true),
            _ => Question::short_answer(course, format!("Q{i}"), 3.0, "Answer"),
        };

        let answer = match i % 3 {
            0 => Answer::multiple_choice(
                question.id,
                question
                    .choices
                    .iter()
                    .filter(|c| c.is_correct)
                    .map(|c| c.id),
            ),
            1 => Answer::true_false(question.id, question.choices[0].id),
            _ => Answer::short_answer(question.id, "  answer "),
        };

        quiz = quiz.with_question(question.id, None);
        questions.push(question);
        answers.push(answer);
    }

    let key = AnswerKey::build(&quiz, &questions).unwrap();
    (key, answers)
}

fn bench_grade_small(c: &mut Criterion) {
    let engine = GradingEngine::default();
    let (key, answers) = build_quiz(10);

    c.bench_function("grading/10_questions", |b| {
        b.iter(|| engine.grade(&key, &answers));
    });
}

fn bench_grade_large(c: &mut Criterion) {
    let engine = GradingEngine::default();
    let (key, answers) = build_quiz(200);

    c.bench_function("grading/200_questions", |b| {
        b.iter(|| engine.grade(&key, &answers));
    });
}

criterion_group!(benches, bench_grade_small, bench_grade_large);
criterion_main!(benches);
