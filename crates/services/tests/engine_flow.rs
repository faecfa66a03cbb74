mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use curriculum_core::gate::ChapterState;
use curriculum_core::grader::grade_test;
use curriculum_core::model::{BatchId, GradeError};
use curriculum_core::time::{fixed_clock, fixed_now};
use services::{
    AssessmentError, ContentGenerationError, ContentGenerator, EngineServices,
    RemediationConfig, RemediationOutcome, RemediationStatus,
};
use storage::repository::{BatchRepository, Storage};
use support::{Reply, ScriptedGenerator, course, quiz, remediation_json};

const BATCH: BatchId = BatchId::new(1);

async fn engine(generator: &ScriptedGenerator) -> EngineServices {
    engine_with(Storage::in_memory(), generator, RemediationConfig::default()).await
}

async fn engine_with(
    storage: Storage,
    generator: &ScriptedGenerator,
    config: RemediationConfig,
) -> EngineServices {
    let engine =
        EngineServices::from_storage(&storage, fixed_clock(), Arc::new(generator.clone()), config);
    engine
        .progress()
        .create_batch(BATCH, "Rust", course())
        .await
        .expect("create batch");
    engine
}

#[tokio::test]
async fn failing_test_appends_one_remediation_chapter() {
    let generator = ScriptedGenerator::new(vec![Reply::Text(remediation_json("Review: moves"))]);
    let engine = engine(&generator).await;

    let (questions, answers) = quiz(4, "moves");
    let submission = engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();

    assert_eq!(submission.result.score(), 60);
    assert!(!submission.passed);
    match submission.remediation {
        RemediationStatus::Done(RemediationOutcome::Appended {
            chapter_index,
            concepts,
        }) => {
            assert_eq!(chapter_index, 3);
            assert_eq!(concepts, vec!["moves".to_owned()]);
        }
        other => panic!("unexpected remediation status: {other:?}"),
    }

    let batch = engine.progress().get_batch(BATCH).await.unwrap();
    assert_eq!(batch.total_chapter_count(), 4);
    let appended = batch.entry(3).unwrap();
    assert_eq!(appended.chapter().title(), "Review: moves");
    assert!(appended.progress().is_adaptive());
    assert_eq!(appended.progress().parent_chapter_index(), Some(0));
    assert_eq!(appended.progress().completed_topics(), 0);

    // Re-running remediation for the same chapter neither generates nor appends.
    let again = engine.remediation().remediate(BATCH, 0).await.unwrap();
    assert_eq!(
        again,
        RemediationOutcome::AlreadyRemediated { chapter_index: 3 }
    );
    assert_eq!(generator.calls(), 1);
    let batch = engine.progress().get_batch(BATCH).await.unwrap();
    assert_eq!(batch.total_chapter_count(), 4);
}

#[tokio::test]
async fn retake_after_remediation_does_not_add_another_chapter() {
    let generator = ScriptedGenerator::new(vec![Reply::Text(remediation_json("Review"))]);
    let engine = engine(&generator).await;

    let (questions, answers) = quiz(5, "moves");
    engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();

    let (questions, answers) = quiz(6, "borrows");
    let retake = engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();
    assert!(matches!(
        retake.remediation,
        RemediationStatus::Done(RemediationOutcome::AlreadyRemediated { chapter_index: 3 })
    ));
    assert_eq!(generator.calls(), 1);

    let batch = engine.progress().get_batch(BATCH).await.unwrap();
    assert_eq!(batch.total_chapter_count(), 4);
    assert_eq!(batch.entry(0).unwrap().progress().test_score(), Some(40));
}

#[tokio::test]
async fn passing_test_needs_no_remediation() {
    let generator = ScriptedGenerator::default();
    let engine = engine(&generator).await;

    let (questions, answers) = quiz(3, "moves");
    let submission = engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();

    assert_eq!(submission.result.score(), 70);
    assert!(submission.passed);
    assert!(matches!(
        submission.remediation,
        RemediationStatus::Done(RemediationOutcome::NotNeeded)
    ));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generation_failure_leaves_ledger_untouched_and_can_be_retried() {
    let generator = ScriptedGenerator::new(vec![Reply::Text("not json at all".into())]);
    let engine = engine(&generator).await;

    let (questions, answers) = quiz(8, "lifetimes");
    let submission = engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();
    assert!(matches!(
        submission.remediation,
        RemediationStatus::Deferred(ContentGenerationError::Malformed(_))
    ));

    let batch = engine.progress().get_batch(BATCH).await.unwrap();
    assert_eq!(batch.total_chapter_count(), 3);
    assert_eq!(batch.entry(0).unwrap().progress().test_score(), Some(20));
    assert!(!batch.has_remediation_for(0));

    generator.push(Reply::Text(remediation_json("Lifetimes, slowly")));
    let retried = engine.remediation().remediate(BATCH, 0).await.unwrap();
    assert!(matches!(
        retried,
        RemediationOutcome::Appended { chapter_index: 3, .. }
    ));
}

#[tokio::test]
async fn slow_generation_times_out_without_mutation() {
    let generator = ScriptedGenerator::new(vec![Reply::Hang]);
    let config = RemediationConfig {
        generation_timeout: Duration::from_millis(50),
    };
    let engine = engine_with(Storage::in_memory(), &generator, config).await;

    let (questions, answers) = quiz(10, "moves");
    let submission = engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();

    assert!(matches!(
        submission.remediation,
        RemediationStatus::Deferred(ContentGenerationError::Timeout(d)) if d == Duration::from_millis(50)
    ));
    let batch = engine.progress().get_batch(BATCH).await.unwrap();
    assert_eq!(batch.total_chapter_count(), 3);
}

/// Writes a retake of chapter 0 straight to storage during the first call.
struct RetakeWhileGenerating {
    batches: Arc<dyn BatchRepository>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ContentGenerator for RetakeWhileGenerating {
    async fn generate(&self, prompt: &str) -> Result<String, ContentGenerationError> {
        let first = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_owned());
            prompts.len() == 1
        };
        if !first {
            return Ok(remediation_json("Review: borrows"));
        }

        let mut batch = self.batches.get_batch(BATCH).await.unwrap().unwrap();
        let (questions, answers) = quiz(5, "borrows");
        let retake = grade_test(&questions, &answers, fixed_now()).unwrap();
        batch.record_test_result(0, retake).unwrap();
        self.batches.update_batch(&batch).await.unwrap();
        Ok(remediation_json("Review: moves"))
    }
}

#[tokio::test]
async fn retake_during_generation_regenerates_for_current_concepts() {
    let storage = Storage::in_memory();
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let generator = RetakeWhileGenerating {
        batches: storage.batches.clone(),
        prompts: prompts.clone(),
    };
    let engine = EngineServices::from_storage(
        &storage,
        fixed_clock(),
        Arc::new(generator),
        RemediationConfig::default(),
    );
    engine
        .progress()
        .create_batch(BATCH, "Rust", course())
        .await
        .unwrap();

    let (questions, answers) = quiz(4, "moves");
    let submission = engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();

    match submission.remediation {
        RemediationStatus::Done(RemediationOutcome::Appended {
            chapter_index,
            concepts,
        }) => {
            assert_eq!(chapter_index, 3);
            assert_eq!(concepts, vec!["borrows".to_owned()]);
        }
        other => panic!("unexpected remediation status: {other:?}"),
    }

    let prompts = prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("moves"));
    assert!(prompts[1].contains("borrows"));

    let batch = engine.progress().get_batch(BATCH).await.unwrap();
    assert_eq!(batch.total_chapter_count(), 4);
    assert_eq!(batch.entry(3).unwrap().chapter().title(), "Review: borrows");
    assert_eq!(batch.entry(0).unwrap().progress().test_score(), Some(50));
}

#[tokio::test]
async fn gated_chapter_rejects_tests_until_gate_is_attempted() {
    let generator = ScriptedGenerator::default();
    let engine = engine(&generator).await;

    assert!(!engine.gates().is_chapter_unlocked(BATCH, 2).await.unwrap());
    let (questions, answers) = quiz(0, "async");
    let err = engine
        .assessment()
        .submit_test(BATCH, 2, &questions, &answers)
        .await
        .unwrap_err();
    assert!(matches!(err, AssessmentError::ChapterLocked { index: 2 }));

    // A failing attempt at the gate is still an attempt.
    let (questions, answers) = quiz(9, "traits");
    engine
        .assessment()
        .submit_test(BATCH, 1, &questions, &answers)
        .await
        .unwrap();
    assert!(engine.gates().is_chapter_unlocked(BATCH, 2).await.unwrap());
}

#[tokio::test]
async fn certificate_requires_every_curriculum_chapter_passed() {
    let generator = ScriptedGenerator::new(vec![Reply::Text(remediation_json("Traits review"))]);
    let engine = engine(&generator).await;
    let progress = engine.progress();
    let assessment = engine.assessment();

    for (chapter, topic) in [(0, 0), (0, 1), (1, 0), (2, 0)] {
        progress
            .mark_topic_completed(BATCH, chapter, topic)
            .await
            .unwrap();
    }
    let (passing, passing_answers) = quiz(1, "misc");
    let (failing, failing_answers) = quiz(5, "traits");
    assessment
        .submit_test(BATCH, 0, &passing, &passing_answers)
        .await
        .unwrap();
    assessment
        .submit_test(BATCH, 1, &failing, &failing_answers)
        .await
        .unwrap();
    assessment
        .submit_test(BATCH, 2, &passing, &passing_answers)
        .await
        .unwrap();
    assert!(
        !engine
            .gates()
            .is_eligible_for_certificate(BATCH)
            .await
            .unwrap()
    );

    let (retake, retake_answers) = quiz(2, "traits");
    assessment
        .submit_test(BATCH, 1, &retake, &retake_answers)
        .await
        .unwrap();
    // Score is fine now, but the assignment is still open.
    assert!(
        !engine
            .gates()
            .is_eligible_for_certificate(BATCH)
            .await
            .unwrap()
    );
    let overview = engine.gates().overview(BATCH).await.unwrap();
    assert_eq!(overview.chapters[1].state, ChapterState::PassedGate(80));
    assert!(!overview.chapters[1].counts_toward_certificate);

    progress.mark_assignment_completed(BATCH, 1).await.unwrap();
    let overview = engine.gates().overview(BATCH).await.unwrap();
    assert!(overview.certificate_eligible);
    assert_eq!(overview.total_chapters, 4);
    assert_eq!(overview.chapters[1].state, ChapterState::PassedGate(80));
    assert!(overview.chapters[1].counts_toward_certificate);
    // The untouched remediation chapter does not block the certificate.
    assert_eq!(overview.chapters[3].state, ChapterState::NotStarted);
    assert!(overview.chapters[3].is_adaptive);
}

#[tokio::test]
async fn generated_tests_drop_malformed_questions() {
    let generator = ScriptedGenerator::new(vec![
        Reply::Text(
            r#"[
                {"question": "What does `&mut` grant?", "options": ["exclusive access", "shared access"], "correctAnswer": 0, "concept": "borrows"},
                {"question": "", "correctAnswer": 0},
                {"options": ["a", "b"]}
            ]"#
            .into(),
        ),
        Reply::Text(r#"[{"question": "no answer"}]"#.into()),
    ]);
    let engine = engine(&generator).await;

    let questions = engine.assessment().generate_test(BATCH, 0).await.unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].concept(), Some("borrows"));

    let err = engine.assessment().generate_test(BATCH, 0).await.unwrap_err();
    assert!(matches!(err, AssessmentError::Grade(GradeError::NoQuestions)));
}

#[tokio::test]
async fn sqlite_backed_engine_round_trips_remediation() {
    let storage = Storage::sqlite("sqlite:file:memdb_engine_flow?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let generator = ScriptedGenerator::new(vec![Reply::Text(remediation_json("Review"))]);
    let engine = engine_with(storage, &generator, RemediationConfig::default()).await;

    engine.progress().mark_topic_completed(BATCH, 0, 0).await.unwrap();
    let (questions, answers) = quiz(7, "moves");
    engine
        .assessment()
        .submit_test(BATCH, 0, &questions, &answers)
        .await
        .unwrap();

    let batch = engine.progress().get_batch(BATCH).await.unwrap();
    assert_eq!(batch.total_chapter_count(), 4);
    assert_eq!(batch.version(), 3);
    assert_eq!(batch.progress_percent(), 20);
}
