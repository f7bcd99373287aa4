use chrono::Duration;
use course_core::model::{
    BadgeRecord, Chapter, ChapterId, CompletionRecord, CourseId, CourseOutline, LearnerId,
};
use course_core::time::fixed_now;
use storage::repository::{BadgeRepository, CourseCatalog, ProgressRepository};
use storage::sqlite::SqliteRepository;

async fn memory_repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_outline(course: u64, orders: &[u32]) -> CourseOutline {
    let course_id = CourseId::new(course);
    let chapters = orders
        .iter()
        .enumerate()
        .map(|(i, order)| {
            Chapter::new(
                ChapterId::new(i as u64 + 1),
                course_id,
                format!("Chapter {}", i + 1),
                *order,
            )
            .unwrap()
        })
        .collect();
    CourseOutline::new(course_id, chapters).unwrap()
}

#[tokio::test]
async fn sqlite_outline_round_trips_in_order() {
    let repo = memory_repo("memdb_outline").await;

    let outline = build_outline(7, &[30, 10, 20]);
    repo.put_outline(&outline).await.unwrap();

    let fetched = repo.outline(CourseId::new(7)).await.unwrap().expect("course");
    let orders: Vec<u32> = fetched
        .chapters()
        .iter()
        .map(Chapter::order_index)
        .collect();
    assert_eq!(orders, vec![10, 20, 30]);
    assert_eq!(fetched, outline);

    assert!(repo.outline(CourseId::new(8)).await.unwrap().is_none());
    assert_eq!(repo.list_courses().await.unwrap(), vec![CourseId::new(7)]);
}

#[tokio::test]
async fn sqlite_republishing_replaces_chapters() {
    let repo = memory_repo("memdb_republish").await;

    repo.put_outline(&build_outline(1, &[1, 2, 3])).await.unwrap();
    repo.put_outline(&build_outline(1, &[5, 6])).await.unwrap();

    let fetched = repo.outline(CourseId::new(1)).await.unwrap().unwrap();
    assert_eq!(fetched.len(), 2);
    assert!(!fetched.contains(ChapterId::new(3)));
}

#[tokio::test]
async fn sqlite_completion_keeps_first_timestamp() {
    let repo = memory_repo("memdb_completion").await;
    repo.put_outline(&build_outline(1, &[1, 2])).await.unwrap();

    let learner = LearnerId::new(42);
    let first = CompletionRecord::new(learner, CourseId::new(1), ChapterId::new(1), fixed_now());
    let mut later = first.clone();
    later.completed_at = fixed_now() + Duration::days(2);

    assert!(repo.insert_completion_if_absent(&first).await.unwrap());
    assert!(!repo.insert_completion_if_absent(&later).await.unwrap());

    let stored = repo
        .completion(learner, CourseId::new(1), ChapterId::new(1))
        .await
        .unwrap()
        .expect("record");
    assert_eq!(stored.completed_at, fixed_now());

    let done = repo
        .completed_chapters(learner, CourseId::new(1))
        .await
        .unwrap();
    assert_eq!(done.len(), 1);
    assert!(done.contains(&ChapterId::new(1)));
}

#[tokio::test]
async fn sqlite_badge_is_unique_per_learner_and_course() {
    let repo = memory_repo("memdb_badges").await;
    repo.put_outline(&build_outline(1, &[1])).await.unwrap();
    repo.put_outline(&build_outline(2, &[1])).await.unwrap();

    let learner = LearnerId::new(5);
    let now = fixed_now();
    assert!(!repo.has_badge(learner, CourseId::new(1)).await.unwrap());

    let first = BadgeRecord::new(learner, CourseId::new(2), now + Duration::hours(1));
    let second = BadgeRecord::new(learner, CourseId::new(1), now);
    assert!(repo.insert_badge_if_absent(&first).await.unwrap());
    assert!(repo.insert_badge_if_absent(&second).await.unwrap());
    assert!(!repo.insert_badge_if_absent(&second).await.unwrap());

    assert!(repo.has_badge(learner, CourseId::new(1)).await.unwrap());
    let badges = repo.badges_for_learner(learner).await.unwrap();
    let courses: Vec<CourseId> = badges.iter().map(|b| b.course_id).collect();
    assert_eq!(courses, vec![CourseId::new(1), CourseId::new(2)]);
    assert!(
        repo.badges_for_learner(LearnerId::new(6))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_racing_inserts_create_one_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.sqlite3").display());
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo.put_outline(&build_outline(1, &[1])).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8_i64 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let at = fixed_now() + Duration::seconds(i);
            let completion =
                CompletionRecord::new(LearnerId::new(1), CourseId::new(1), ChapterId::new(1), at);
            let badge = BadgeRecord::new(LearnerId::new(1), CourseId::new(1), at);
            let c = repo.insert_completion_if_absent(&completion).await.unwrap();
            let b = repo.insert_badge_if_absent(&badge).await.unwrap();
            (c, b)
        }));
    }

    let mut completions = 0;
    let mut badges = 0;
    for handle in handles {
        let (c, b) = handle.await.unwrap();
        completions += usize::from(c);
        badges += usize::from(b);
    }
    assert_eq!(completions, 1);
    assert_eq!(badges, 1);
    assert_eq!(
        repo.badges_for_learner(LearnerId::new(1)).await.unwrap().len(),
        1
    );
}
