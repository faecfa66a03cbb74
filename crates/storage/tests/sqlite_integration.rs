use curriculum_core::grader::grade_test;
use curriculum_core::model::{
    Answers, Batch, BatchId, ChapterDraft, Question, SubmittedAnswer, TopicDraft,
};
use curriculum_core::time::fixed_now;
use storage::repository::{BatchRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_batch(id: u64) -> Batch {
    Batch::new(
        BatchId::new(id),
        "Rust Foundations",
        vec![
            ChapterDraft::new(
                "Ownership",
                vec![
                    TopicDraft::new("Moves", "").with_resource(
                        "https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html",
                    ),
                    TopicDraft::new("Borrowing", ""),
                ],
            )
            .test_gate(),
            ChapterDraft::new("Errors", vec![TopicDraft::new("Result", "")]).with_assignment(),
        ],
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_persists_progress_and_results() {
    let repo = connect("memdb_batch_roundtrip").await;
    let batch = build_batch(1);
    repo.insert_batch(&batch).await.unwrap();

    let mut loaded = repo.get_batch(batch.id()).await.unwrap().expect("stored");
    assert_eq!(loaded, batch);

    loaded.mark_topic_completed(0, 0).unwrap();
    loaded.mark_topic_completed(0, 1).unwrap();
    let question = Question::multiple_choice(
        "Who owns a moved value?",
        vec!["caller".into(), "callee".into()],
        1,
    )
    .unwrap()
    .with_concept("moves");
    let answers: Answers = [(0, SubmittedAnswer::Option(0))].into_iter().collect();
    let result = grade_test(&[question], &answers, fixed_now()).unwrap();
    loaded.record_test_result(0, result).unwrap();

    let version = repo.update_batch(&loaded).await.unwrap();
    assert_eq!(version, 1);

    let reloaded = repo.get_batch(batch.id()).await.unwrap().expect("stored");
    assert_eq!(reloaded.version(), 1);
    assert_eq!(reloaded.progress_percent(), 67);
    let progress = reloaded.entry(0).unwrap().progress();
    assert!(progress.is_completed());
    assert_eq!(progress.test_score(), Some(0));
    assert_eq!(
        progress
            .test_result()
            .map(|r| r.concepts_to_review().iter().cloned().collect::<Vec<_>>()),
        Some(vec!["moves".to_owned()])
    );
    assert_eq!(reloaded.entry(1).unwrap().progress().assignment_completed(), Some(false));
}

#[tokio::test]
async fn sqlite_rejects_duplicate_and_stale_writes() {
    let repo = connect("memdb_batch_conflicts").await;
    let batch = build_batch(7);
    repo.insert_batch(&batch).await.unwrap();
    assert!(matches!(
        repo.insert_batch(&batch).await.unwrap_err(),
        StorageError::Conflict
    ));

    let mut first = repo.get_batch(batch.id()).await.unwrap().unwrap();
    let mut second = first.clone();
    first.mark_topic_completed(1, 0).unwrap();
    repo.update_batch(&first).await.unwrap();

    second.mark_topic_completed(0, 0).unwrap();
    assert!(matches!(
        repo.update_batch(&second).await.unwrap_err(),
        StorageError::Conflict
    ));

    let missing = build_batch(99);
    assert!(matches!(
        repo.update_batch(&missing).await.unwrap_err(),
        StorageError::NotFound
    ));
}

#[tokio::test]
async fn sqlite_persists_remediation_chapters() {
    let repo = connect("memdb_batch_remediation").await;
    let mut batch = build_batch(3);
    repo.insert_batch(&batch).await.unwrap();

    let review = ChapterDraft::new("Review: moves", vec![TopicDraft::new("Moves again", "")])
        .validate()
        .unwrap();
    batch.append_adaptive_chapter(review, 0).unwrap();
    let version = repo.update_batch(&batch).await.unwrap();
    batch.set_version(version);

    let loaded = repo.get_batch(batch.id()).await.unwrap().unwrap();
    assert_eq!(loaded, batch);
    assert_eq!(loaded.total_chapter_count(), 3);
    assert!(loaded.has_remediation_for(0));
    assert_eq!(loaded.entry(2).unwrap().progress().parent_chapter_index(), Some(0));
}

#[tokio::test]
async fn sqlite_lists_batches_in_id_order() {
    let repo = connect("memdb_batch_list").await;
    for id in [5, 2, 9] {
        repo.insert_batch(&build_batch(id)).await.unwrap();
    }
    let ids: Vec<_> = repo
        .list_batches(10)
        .await
        .unwrap()
        .iter()
        .map(|b| b.id().value())
        .collect();
    assert_eq!(ids, vec![2, 5, 9]);
}
