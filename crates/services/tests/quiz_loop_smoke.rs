use quiz_core::engine::QuizTimings;
use quiz_core::model::{ChoiceId, ModuleId, Reward, StageId};
use quiz_core::time::fixed_now;
use services::{Clock, CompletionHistoryService, QuizLoopService, QuizRunner, SessionPhase};
use storage::repository::RewardOverrideRepository;
use storage::{Catalog, Storage};

async fn sqlite_storage(name: &str) -> Storage {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    Storage::sqlite(&url, Catalog::builtin().expect("catalog"))
        .await
        .expect("storage")
}

fn loop_service(storage: &Storage) -> QuizLoopService {
    QuizLoopService::from_storage(Clock::fixed(fixed_now()), storage)
        .with_timings(QuizTimings::immediate())
}

async fn answer_all(runner: &mut QuizRunner, choices: &[&str]) {
    for (idx, choice) in choices.iter().enumerate() {
        runner
            .select_choice(idx, &ChoiceId::from(*choice))
            .await
            .expect("select");
        runner.settle().await;
        if idx + 1 < choices.len() {
            runner.advance().await.expect("advance");
        }
    }
    runner.finish().await.expect("finish");
    runner.settle().await;
}

#[tokio::test]
async fn first_answer_is_recorded_in_history() {
    let storage = sqlite_storage("smoke_first_answer").await;
    let svc = loop_service(&storage);
    let mut runner = svc
        .start_session(&ModuleId::from("AvoidingPanicDecisions"))
        .await
        .unwrap();

    let feedback = runner
        .select_choice(0, &ChoiceId::from("debt"))
        .await
        .unwrap();
    assert!(feedback.is_correct);
    assert_eq!(feedback.points, 4);

    let session = runner.snapshot().await;
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history()[0].stage_id, StageId::new(1));
    assert!(session.history()[0].is_correct);
    assert_eq!(session.coins_accumulated(), 4);
}

#[tokio::test]
async fn passing_run_is_persisted_once() {
    let storage = sqlite_storage("smoke_passing_run").await;
    let svc = loop_service(&storage);
    let module_id = ModuleId::from("AvoidingPanicDecisions");
    let mut runner = svc.start_session(&module_id).await.unwrap();

    answer_all(
        &mut runner,
        &["debt", "pause", "ignore", "sleep-on-it", "emergency-fund"],
    )
    .await;
    assert_eq!(
        runner.phase().await,
        SessionPhase::Completed {
            results_visible: true
        }
    );

    let id = svc.finalize(&mut runner).await.unwrap().expect("persisted");
    assert_eq!(svc.finalize(&mut runner).await.unwrap(), Some(id));

    let history = CompletionHistoryService::new(storage.completions.clone());
    let items = history.list_recent(&module_id, 10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].correct, 5);
    assert_eq!(items[0].coins, 20);
    assert_eq!(items[0].xp, 10);
}

#[tokio::test]
async fn failed_run_uses_fallback_and_is_not_persisted() {
    let storage = sqlite_storage("smoke_failed_run").await;
    let svc = loop_service(&storage);
    let module_id = ModuleId::from("BudgetingBasics");
    let mut runner = svc.start_session(&module_id).await.unwrap();

    answer_all(&mut runner, &["plan", "game-skin", "adjust"]).await;
    let outcome = *runner.snapshot().await.outcome().unwrap();
    assert!(!outcome.passed);
    assert_eq!(outcome.correct_count, 2);
    // Proportional: floor(15 * 2 / 3) coins, floor(6 * 2 / 3) xp.
    assert_eq!(outcome.reward, Reward::new(10, 4));

    assert_eq!(svc.finalize(&mut runner).await.unwrap(), None);
    let history = CompletionHistoryService::new(storage.completions.clone());
    assert!(history.list_recent(&module_id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn retry_after_finish_starts_a_fresh_run() {
    let storage = sqlite_storage("smoke_retry").await;
    let svc = loop_service(&storage);
    let module_id = ModuleId::from("OnlineSafetyAwareness");
    let mut runner = svc.start_session(&module_id).await.unwrap();

    answer_all(&mut runner, &["refuse", "official", "passphrase"]).await;
    let first = svc.finalize(&mut runner).await.unwrap().expect("first");

    runner.retry().await;
    let session = runner.snapshot().await;
    assert!(session.history().is_empty());
    assert_eq!(session.coins_accumulated(), 0);
    assert!(!session.is_completed());
    assert_eq!(runner.completion_id(), None);

    answer_all(&mut runner, &["refuse", "official", "passphrase"]).await;
    let second = svc.finalize(&mut runner).await.unwrap().expect("second");
    assert_ne!(first, second);

    let history = CompletionHistoryService::new(storage.completions.clone());
    let items = history.list_recent(&module_id, 10).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, second);
}

#[tokio::test]
async fn persisted_override_changes_full_reward() {
    let storage = sqlite_storage("smoke_override").await;
    storage
        .overrides
        .set_override("finance-avoiding-panic", Reward::new(50, 25))
        .await
        .unwrap();

    let svc = loop_service(&storage);
    let mut runner = svc
        .start_session(&ModuleId::from("AvoidingPanicDecisions"))
        .await
        .unwrap();
    answer_all(
        &mut runner,
        &["debt", "pause", "ignore", "sleep-on-it", "emergency-fund"],
    )
    .await;

    let outcome = *runner.snapshot().await.outcome().unwrap();
    assert_eq!(outcome.reward, Reward::new(50, 25));
}
