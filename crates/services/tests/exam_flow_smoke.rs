use std::sync::Arc;

use exam_core::model::{
    AnswerOption, Certification, CertificationId, Difficulty, DomainTag, OptionKey, Question,
    QuestionId, SessionStatus, TestKind,
};
use exam_core::time::fixed_now;
use services::{AttemptHistoryService, Clock, ExamFlowService};
use storage::repository::{
    AttemptRepository, CertificationRepository, InMemoryRepository, QuestionRepository,
};

fn key(raw: char) -> OptionKey {
    OptionKey::new(raw).unwrap()
}

fn build_question(id: u64, domain: &DomainTag) -> Question {
    let options = vec![
        AnswerOption::new(key('A'), "Right", true).unwrap(),
        AnswerOption::new(key('B'), "Wrong", false).unwrap(),
        AnswerOption::new(key('C'), "Also wrong", false).unwrap(),
    ];
    Question::new(
        QuestionId::new(id),
        format!("Q{id}"),
        options,
        domain.clone(),
        Difficulty::Medium,
    )
    .unwrap()
}

#[tokio::test]
async fn exam_flow_scores_and_persists_attempt() {
    let repo = InMemoryRepository::new();
    let now = fixed_now();
    let certification_id = CertificationId::new(1);
    let role = DomainTag::new("role").unwrap();
    let artifact = DomainTag::new("artifact").unwrap();

    let certification = Certification::new(
        certification_id,
        "Smoke Cert",
        "",
        70,
        vec![role.clone(), artifact.clone()],
        now,
    )
    .unwrap();
    repo.upsert_certification(&certification).await.unwrap();

    for id in 1..=3 {
        repo.upsert_question(certification_id, &build_question(id, &role))
            .await
            .unwrap();
    }
    for id in 4..=10 {
        repo.upsert_question(certification_id, &build_question(id, &artifact))
            .await
            .unwrap();
    }

    let flow = ExamFlowService::new(
        Clock::fixed(now),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let mut exam = flow
        .launch_exam(certification_id, TestKind::Short, &[])
        .await
        .unwrap();

    // Walk the paper: two correct role answers, one wrong and flagged, five
    // correct artifact answers, two left blank.
    let questions = exam.session().with(|s| s.questions().to_vec()).unwrap();
    assert_eq!(questions.len(), 10);
    for question in questions.iter().take(2) {
        exam.select_answer(question.id(), key('A')).unwrap();
        exam.go_to_next().unwrap();
    }
    exam.select_answer(questions[2].id(), key('B')).unwrap();
    exam.toggle_flag(questions[2].id()).unwrap();
    for question in questions.iter().skip(3).take(5) {
        exam.select_answer(question.id(), key('A')).unwrap();
    }
    exam.jump_to(9).unwrap();
    assert_eq!(exam.current_index().unwrap(), 9);

    let progress = exam.progress().unwrap();
    assert_eq!(progress.answered(), 8);
    assert_eq!(progress.flagged(), 1);

    let outcome = flow.submit_exam(&mut exam).await.unwrap();
    assert_eq!(outcome.result.correct_count(), 7);
    assert_eq!(outcome.result.score_percent(), 70);
    assert!(outcome.result.passed());
    let attempt_id = outcome.attempt_id.expect("attempt persisted");

    assert_eq!(exam.status().unwrap(), SessionStatus::Completed);

    // A second submission returns the same outcome without a second row.
    let again = flow.submit_exam(&mut exam).await.unwrap();
    assert_eq!(again.attempt_id, Some(attempt_id));
    assert_eq!(again.result, outcome.result);

    let rows = repo
        .list_attempt_rows(certification_id, None, None, 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.answers.len(), 8);

    let history = AttemptHistoryService::new(Clock::fixed(now), Arc::new(repo.clone()));
    let items = history
        .list_recent_attempts(certification_id, 7, 10)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].score_percent, 70);
    assert!(items[0].passed);

    let result = history.get_result(attempt_id).await.unwrap();
    let role_score = result.domain_scores().get(&role).unwrap();
    assert_eq!(role_score.correct(), 2);
    assert_eq!(role_score.total(), 3);
    assert_eq!(role_score.score_percent(), 67);
    let artifact_score = result.domain_scores().get(&artifact).unwrap();
    assert_eq!(artifact_score.score_percent(), 71);
}
