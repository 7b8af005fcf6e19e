// tests/lifecycle_tests.rs

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use match_engine::domain::{
    BracketMatchState, EndReason, MatchId, MatchStatus, Side, TournamentId, TournamentStatus,
    UserId,
};
use match_engine::engine::{
    spawn_sweeper, AppliedMove, ArenaEngine, CreateMatchRequest, CreateTournamentRequest,
    EngineError, JoinOutcome, MoveOutcome, MoveRules, TimeoutVerdict, UncheckedRules,
};
use match_engine::infra::{InMemoryMatchStore, MatchStore, RetryPolicy};
use match_engine::time_ctrl::{ManualTimeSource, TimeControl};
use match_engine::tournament::Seeding;
use match_engine::EngineConfig;

//
// ---------- helpers ----------
//

struct Harness {
    engine: Arc<ArenaEngine>,
    store: Arc<InMemoryMatchStore>,
    clock: Arc<ManualTimeSource>,
}

fn harness_with(config: EngineConfig) -> Harness {
    harness_with_rules(config, Arc::new(UncheckedRules))
}

fn harness_with_rules(config: EngineConfig, rules: Arc<dyn MoveRules>) -> Harness {
    let store = Arc::new(InMemoryMatchStore::new());
    let clock = Arc::new(ManualTimeSource::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().unwrap(),
    ));
    let engine = ArenaEngine::new(config, store.clone(), rules, clock.clone()).expect("engine");

    Harness {
        engine: Arc::new(engine),
        store,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

fn user(name: &str) -> UserId {
    UserId::from(name)
}

async fn casual(h: &Harness, secs: u32) -> MatchId {
    h.engine
        .create_match(CreateMatchRequest {
            creator: user("alice"),
            side: Side::White,
            time_control: TimeControl::sudden_death(secs),
            wager: None,
        })
        .await
        .expect("create")
        .game_id
}

/// Матч alice (белые) против bob, уже идёт.
async fn playing(h: &Harness, secs: u32) -> MatchId {
    let id = casual(h, secs).await;
    h.engine.join_match(&id, &user("bob")).await.expect("join");
    id
}

async fn stored_status(h: &Harness, id: &MatchId) -> MatchStatus {
    h.store.get_match(id).await.unwrap().expect("record").status
}

/// Турнир на двоих x против y, матч сетки уже создан.
async fn duel(h: &Harness) -> (TournamentId, MatchId) {
    let tournament = h
        .engine
        .create_tournament(CreateTournamentRequest {
            name: "Duel".into(),
            participants: vec![user("x"), user("y")],
            bracket_size: None,
            seeding: Seeding::EntryOrder,
            time_control: TimeControl::new(180, 0),
        })
        .await
        .unwrap();
    let id = tournament.bracket_match(1, 1).unwrap().match_id.clone().unwrap();
    (tournament.id, id)
}

/// Правила, которые падают, когда у кого-то кончается время.
struct FlagPanicRules;

impl MoveRules for FlagPanicRules {
    fn initial_position(&self) -> String {
        UncheckedRules.initial_position()
    }

    fn apply_move(&self, position: &str, side: Side, mv: &str) -> Result<AppliedMove, String> {
        UncheckedRules.apply_move(position, side, mv)
    }

    fn timeout_verdict(&self, _position: &str, _flagged: Side) -> TimeoutVerdict {
        panic!("движок правил недоступен");
    }
}

//
// TEST 1 — полный цикл: создание, вход, ходы, сдача, запись в хранилище
//
#[tokio::test]
async fn casual_match_lifecycle() {
    let h = harness();
    let id = casual(&h, 600).await;
    assert_eq!(stored_status(&h, &id).await, MatchStatus::Waiting);

    let joined = h.engine.join_match(&id, &user("bob")).await.unwrap();
    assert_eq!(joined, JoinOutcome::Started(Side::Black));
    assert_eq!(stored_status(&h, &id).await, MatchStatus::Playing);

    h.clock.advance_secs(3);
    h.engine.submit_move(&id, &user("alice"), "e2e4").await.unwrap();
    h.engine.submit_move(&id, &user("bob"), "e7e5").await.unwrap();

    let ack = h.engine.resign(&id, &user("bob")).await.unwrap();
    assert!(ack.applied);
    assert_eq!(ack.outcome.winner_id, Some(user("alice")));

    let stored = h.store.get_match(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, MatchStatus::Completed);
    assert_eq!(stored.end_reason, Some(EndReason::Resignation));
    assert_eq!(stored.winner_id, Some(user("alice")));
    assert_eq!(stored.move_count, 2);
    assert_eq!(stored.white_time, 597);
    stored.check_invariants().unwrap();

    assert!(!h.engine.registry().contains(&id));
    assert!(h.engine.registry().is_empty());
}

//
// TEST 2 — гонка сигналов: ровно один применён, все видят один итог
//
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_terminations_apply_once() {
    let h = harness();
    let id = playing(&h, 600).await;

    let mut tasks = Vec::new();
    for n in 0..8 {
        let engine = h.engine.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            match n % 4 {
                0 => engine.resign(&id, &user("bob")).await,
                1 => engine.report_disconnection(&id, &user("bob")).await,
                2 => engine.resign(&id, &user("alice")).await,
                _ => engine.abort_match(&id).await,
            }
        }));
    }

    let mut acks = Vec::new();
    for task in tasks {
        acks.push(task.await.unwrap().expect("ack"));
    }

    assert_eq!(acks.iter().filter(|a| a.applied).count(), 1);
    let first = &acks[0].outcome;
    assert!(acks.iter().all(|a| &a.outcome == first));

    let stored = h.store.get_match(&id).await.unwrap().unwrap();
    assert_eq!(stored.outcome(), *first);
    stored.check_invariants().unwrap();
}

//
// TEST 3 — маячок после сдачи и после выселения: подтверждение без изменений
//
#[tokio::test]
async fn late_beacon_answered_from_history() {
    let h = harness();
    let id = playing(&h, 600).await;

    let resigned = h.engine.resign(&id, &user("bob")).await.unwrap();
    assert!(!h.engine.registry().contains(&id));

    h.clock.advance_secs(5);
    let beacon = h.engine.report_disconnection(&id, &user("bob")).await.unwrap();
    assert!(beacon.is_duplicate());
    assert_eq!(beacon.outcome, resigned.outcome);

    let again = h.engine.report_disconnection(&id, &user("bob")).await.unwrap();
    assert_eq!(again, beacon);

    // Не-терминальные операции получают ошибку статуса.
    let err = h.engine.submit_move(&id, &user("alice"), "e2e4").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidStateTransition {
            status: MatchStatus::Completed,
            ..
        }
    ));

    let err = h.engine.resign(&MatchId::from("m-404"), &user("bob")).await.unwrap_err();
    assert_eq!(err, EngineError::MatchNotFound(MatchId::from("m-404")));
}

//
// TEST 4 — хранилище недоступно: итог в логе, сессия всё равно выселена
//
#[tokio::test(start_paused = true)]
async fn exhausted_retries_still_evict_session() {
    let mut config = EngineConfig::default();
    config.persistence_retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 10,
        max_backoff_ms: 100,
        multiplier: 2.0,
    };
    let h = harness_with(config);
    let id = playing(&h, 600).await;

    h.store.fail_next_updates(3);
    let ack = h.engine.resign(&id, &user("bob")).await.unwrap();
    assert!(ack.applied);

    assert!(!h.engine.registry().contains(&id));
    assert_eq!(stored_status(&h, &id).await, MatchStatus::Playing);
}

//
// TEST 5 — временный сбой хранилища переживается повтором
//
#[tokio::test(start_paused = true)]
async fn transient_store_failure_is_retried() {
    let h = harness();
    let id = playing(&h, 600).await;

    h.store.fail_next_updates(2);
    h.engine.resign(&id, &user("alice")).await.unwrap();

    let stored = h.store.get_match(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, MatchStatus::Completed);
    assert_eq!(stored.winner_id, Some(user("bob")));
}

//
// TEST 6 — обход: таймаут ожидания и падение флажка
//
#[tokio::test]
async fn sweep_finds_expired_sessions() {
    let h = harness();
    let lonely = casual(&h, 600).await;
    let blitz = playing(&h, 60).await;
    let rapid = playing(&h, 600).await;

    h.clock.advance_secs(61);
    let report = h.engine.sweep().await;
    assert_eq!(report.inspected, 3);
    assert_eq!(report.clock_expired, vec![blitz.clone()]);
    assert!(report.join_timeouts.is_empty());

    let stored = h.store.get_match(&blitz).await.unwrap().unwrap();
    assert_eq!(stored.end_reason, Some(EndReason::Timeout));
    assert_eq!(stored.winner_id, Some(user("bob")));
    assert_eq!(stored.white_time, 0);

    h.clock.advance_secs(240);
    let report = h.engine.sweep().await;
    assert_eq!(report.inspected, 2);
    assert_eq!(report.join_timeouts, vec![lonely.clone()]);
    assert_eq!(stored_status(&h, &lonely).await, MatchStatus::Aborted);

    assert!(h.engine.registry().contains(&rapid));
    assert!(h.engine.sweep().await.is_empty());
}

//
// TEST 7 — проверка часов по запросу
//
#[tokio::test]
async fn on_demand_clock_check() {
    let h = harness();
    let id = playing(&h, 60).await;

    assert_eq!(h.engine.check_clock(&id).await.unwrap(), None);

    h.clock.advance_secs(60);
    let ack = h.engine.check_clock(&id).await.unwrap().expect("flag");
    assert!(ack.applied);
    assert_eq!(ack.outcome.end_reason, Some(EndReason::Timeout));

    // Повторная проверка уже закрытого матча ничего не делает.
    assert_eq!(h.engine.check_clock(&id).await.unwrap(), None);
    assert!(matches!(
        h.engine.check_clock(&MatchId::from("nope")).await,
        Err(EngineError::MatchNotFound(_))
    ));
}

//
// TEST 8 — ход после падения флажка завершает матч через движок
//
#[tokio::test]
async fn late_move_finishes_match() {
    let h = harness();
    let id = playing(&h, 60).await;

    h.clock.advance_secs(90);
    let outcome = h.engine.submit_move(&id, &user("alice"), "e2e4").await.unwrap();
    let MoveOutcome::Finished(ack) = outcome else {
        panic!("ожидали завершение по времени");
    };
    assert!(ack.applied);
    assert_eq!(stored_status(&h, &id).await, MatchStatus::Completed);
    assert!(!h.engine.registry().contains(&id));
}

//
// TEST 9 — ничья через движок и вид матча
//
#[tokio::test]
async fn draw_and_match_view() {
    let h = harness();
    let id = playing(&h, 600).await;

    h.engine.offer_draw(&id, &user("alice")).await.unwrap();
    let view = h.engine.match_view(&id).await.unwrap();
    assert!(view.live);
    assert_eq!(view.draw_offer, Some(Side::White));

    let ack = h.engine.accept_draw(&id, &user("bob")).await.unwrap();
    assert_eq!(ack.outcome.end_reason, Some(EndReason::Draw));
    assert_eq!(ack.outcome.winner_id, None);

    let view = h.engine.match_view(&id).await.unwrap();
    assert!(!view.live);
    assert_eq!(view.record.status, MatchStatus::Completed);
}

//
// TEST 10 — отмена создателем и ошибки создания
//
#[tokio::test]
async fn cancel_and_rejected_time_control() {
    let h = harness();
    let id = casual(&h, 300).await;

    let err = h.engine.cancel_match(&id, &user("bob")).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownParticipant { .. }));

    let ack = h.engine.cancel_match(&id, &user("alice")).await.unwrap();
    assert_eq!(ack.outcome.status, MatchStatus::Aborted);

    let err = h
        .engine
        .create_match(CreateMatchRequest {
            creator: user("alice"),
            side: Side::Black,
            time_control: TimeControl::sudden_death(5),
            wager: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
    assert_eq!(h.store.match_count(), 1);
}

//
// TEST 11 — турнир на четверых до чемпиона
//
#[tokio::test]
async fn tournament_runs_to_champion() {
    let h = harness();
    let tournament = h
        .engine
        .create_tournament(CreateTournamentRequest {
            name: "Cup".into(),
            participants: ["a", "b", "c", "d"].into_iter().map(UserId::from).collect(),
            bracket_size: None,
            seeding: Seeding::EntryOrder,
            time_control: TimeControl::new(180, 2),
        })
        .await
        .unwrap();
    let tid = tournament.id.clone();

    let first = tournament.bracket_match(1, 1).unwrap().match_id.clone().unwrap();
    let second = tournament.bracket_match(1, 2).unwrap().match_id.clone().unwrap();
    assert_eq!(tournament.bracket_match(1, 1).unwrap().state, BracketMatchState::InPlay);
    assert_eq!(stored_status(&h, &first).await, MatchStatus::Waiting);

    // a–d: стартует явно, d сдаётся.
    h.engine.start_match(&first).await.unwrap();
    h.engine.resign(&first, &user("d")).await.unwrap();

    // b–c: стартует, когда участник отмечается.
    let joined = h.engine.join_match(&second, &user("c")).await.unwrap();
    assert_eq!(joined, JoinOutcome::Started(Side::Black));
    h.engine.resign(&second, &user("b")).await.unwrap();

    let mid = h.engine.tournament(&tid).await.unwrap();
    let final_match = mid.bracket_match(2, 1).unwrap();
    assert_eq!(final_match.white, Some(user("a")));
    assert_eq!(final_match.black, Some(user("c")));
    assert_eq!(final_match.state, BracketMatchState::InPlay);
    let final_id = final_match.match_id.clone().unwrap();

    h.engine.start_match(&final_id).await.unwrap();
    h.engine.resign(&final_id, &user("c")).await.unwrap();

    let done = h.engine.tournament(&tid).await.unwrap();
    assert!(done.is_concluded());
    assert_eq!(done.champion, Some(user("a")));
    assert!(!h.engine.lobby().contains(&tid));

    let persisted = h.store.get_tournament(&tid).await.unwrap().unwrap();
    assert_eq!(persisted, done);

    let matches = h.store.list_tournament_matches(&tid).await.unwrap();
    let slots: Vec<_> = matches
        .iter()
        .map(|m| {
            let link = m.tournament.as_ref().unwrap();
            (link.round, link.match_number)
        })
        .collect();
    assert_eq!(slots, vec![(1, 1), (1, 2), (2, 1)]);
    assert!(matches.iter().all(|m| m.status == MatchStatus::Completed));
}

//
// TEST 12 — ничья в сетке ждёт тай-брейк
//
#[tokio::test]
async fn tournament_draw_waits_for_tiebreak() {
    let h = harness();
    let tournament = h
        .engine
        .create_tournament(CreateTournamentRequest {
            name: "Duel".into(),
            participants: vec![user("x"), user("y")],
            bracket_size: None,
            seeding: Seeding::EntryOrder,
            time_control: TimeControl::new(180, 0),
        })
        .await
        .unwrap();
    let tid = tournament.id.clone();
    let id = tournament.bracket_match(1, 1).unwrap().match_id.clone().unwrap();

    h.engine.start_match(&id).await.unwrap();
    h.engine.offer_draw(&id, &user("x")).await.unwrap();
    h.engine.accept_draw(&id, &user("y")).await.unwrap();

    let t = h.engine.tournament(&tid).await.unwrap();
    assert_eq!(t.bracket_match(1, 1).unwrap().state, BracketMatchState::AwaitingTiebreak);
    assert_eq!(t.status, TournamentStatus::InProgress);

    h.engine.report_tiebreak(&tid, 1, 1, &user("y")).await.unwrap();
    let t = h.engine.tournament(&tid).await.unwrap();
    assert_eq!(t.champion, Some(user("y")));
}

//
// TEST 13 — фоновый обход замечает упавший флажок
//
#[tokio::test(start_paused = true)]
async fn background_sweeper_flags_clock() {
    let mut config = EngineConfig::default();
    config.sweep_interval_ms = 50;
    let h = harness_with(config);
    let id = playing(&h, 60).await;

    let sweeper = spawn_sweeper(h.engine.clone());
    h.clock.advance_secs(61);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    sweeper.shutdown().await.unwrap();

    assert!(!h.engine.registry().contains(&id));
    assert_eq!(stored_status(&h, &id).await, MatchStatus::Completed);
}

//
// TEST 14 — конфигурация из JSON
//
#[test]
fn config_from_json() {
    let config = EngineConfig::from_json_str(r#"{"join_timeout_secs": 120}"#).unwrap();
    assert_eq!(config.join_timeout_secs, 120);
    assert_eq!(config.join_timeout_ms(), 120_000);
    assert_eq!(config.sweep_interval_ms, 1_000);

    assert!(matches!(
        EngineConfig::from_json_str(r#"{"join_timeout_secs": 0}"#),
        Err(EngineError::InvalidConfig(_))
    ));
    assert!(matches!(
        EngineConfig::from_json_str("not json"),
        Err(EngineError::InvalidConfig(_))
    ));

    assert!(config.check_time_control(&TimeControl::new(600, 5)).is_ok());
    assert!(config.check_time_control(&TimeControl::new(600, 600)).is_err());
}

//
// TEST 15 — неявка в турнирный матч: отмена по таймауту, сетка ждёт тай-брейк
//
#[tokio::test]
async fn tournament_no_show_aborted_by_sweep() {
    let h = harness();
    let (tid, id) = duel(&h).await;

    h.clock.advance_secs(299);
    assert!(h.engine.sweep().await.is_empty());
    assert_eq!(stored_status(&h, &id).await, MatchStatus::Waiting);

    h.clock.advance_secs(2);
    let report = h.engine.sweep().await;
    assert_eq!(report.join_timeouts, vec![id.clone()]);
    assert!(!h.engine.registry().contains(&id));

    let stored = h.store.get_match(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, MatchStatus::Aborted);
    assert_eq!(stored.end_reason, Some(EndReason::Abort));
    assert_eq!(stored.winner_id, None);

    let t = h.engine.tournament(&tid).await.unwrap();
    assert_eq!(t.bracket_match(1, 1).unwrap().state, BracketMatchState::AwaitingTiebreak);
    assert_eq!(t.status, TournamentStatus::InProgress);

    h.engine.report_tiebreak(&tid, 1, 1, &user("x")).await.unwrap();
    let t = h.engine.tournament(&tid).await.unwrap();
    assert_eq!(t.champion, Some(user("x")));
}

//
// TEST 16 — турнир выгружен из лобби: итог матча всё равно доходит до сетки
//
#[tokio::test]
async fn unloaded_tournament_rehydrated_from_store() {
    let h = harness();
    let (tid, id) = duel(&h).await;

    assert!(h.engine.lobby().remove(&tid).is_some());
    assert!(!h.engine.lobby().contains(&tid));

    h.engine.start_match(&id).await.unwrap();
    h.engine.resign(&id, &user("y")).await.unwrap();

    let persisted = h.store.get_tournament(&tid).await.unwrap().unwrap();
    assert_eq!(persisted.bracket_match(1, 1).unwrap().state, BracketMatchState::Decided);
    assert_eq!(persisted.champion, Some(user("x")));
    assert!(persisted.is_concluded());
    assert!(!h.engine.lobby().contains(&tid));
}

//
// TEST 17 — упавшая задача обхода видна при остановке
//
#[tokio::test(start_paused = true)]
async fn panicked_sweeper_reported_on_shutdown() {
    let mut config = EngineConfig::default();
    config.sweep_interval_ms = 50;
    let h = harness_with_rules(config, Arc::new(FlagPanicRules));
    let id = playing(&h, 60).await;

    let sweeper = spawn_sweeper(h.engine.clone());
    h.clock.advance_secs(61);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let err = sweeper.shutdown().await.unwrap_err();
    assert!(err.is_panic());
    assert_eq!(stored_status(&h, &id).await, MatchStatus::Playing);
}
