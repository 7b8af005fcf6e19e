// tests/bracket_tests.rs

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use match_engine::domain::{
    BracketMatchState, MatchId, Tournament, TournamentId, TournamentStatus, UserId,
};
use match_engine::engine::EngineError;
use match_engine::time_ctrl::TimeControl;
use match_engine::tournament::seeding::{
    self, default_bracket_size, seed_order, validate_bracket_size,
};
use match_engine::tournament::{
    feeder_matches, matches_in_round, next_slot, round_count, BracketEvent, BracketManager,
    NewTournament, Seeding, SlotSide,
};

//
// ---------- helpers ----------
//

fn users(names: &[&str]) -> Vec<UserId> {
    names.iter().map(|n| UserId::from(*n)).collect()
}

fn spec(names: &[&str]) -> NewTournament {
    NewTournament {
        id: TournamentId::from("t-1"),
        name: "Cup".into(),
        participants: users(names),
        bracket_size: None,
        seeding: Seeding::EntryOrder,
        time_control: TimeControl::new(180, 2),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).single().unwrap(),
    }
}

fn build(names: &[&str]) -> (Tournament, Vec<BracketEvent>) {
    BracketManager::build(spec(names)).expect("build")
}

/// Привязать матч сетки к фиктивному id и сразу сообщить победителя.
fn play(t: &mut Tournament, round: u32, match_number: u32, winner: &str) -> Vec<BracketEvent> {
    let id = MatchId::new(format!("m-{round}-{match_number}"));
    BracketManager::bind_match(t, round, match_number, id).expect("bind");
    BracketManager::on_match_completed(t, round, match_number, Some(&UserId::from(winner)))
        .expect("complete")
}

//
// TEST 1 — арифметика мест
//
#[test]
fn slot_arithmetic_examples() {
    let t = next_slot(1, 1);
    assert_eq!((t.round, t.match_number, t.side), (2, 1, SlotSide::First));
    let t = next_slot(1, 2);
    assert_eq!((t.round, t.match_number, t.side), (2, 1, SlotSide::Second));
    let t = next_slot(2, 3);
    assert_eq!((t.round, t.match_number, t.side), (3, 2, SlotSide::First));

    assert_eq!(feeder_matches(1), (1, 2));
    assert_eq!(feeder_matches(3), (5, 6));

    assert_eq!(round_count(8), 3);
    assert_eq!(matches_in_round(8, 1), 4);
    assert_eq!(matches_in_round(8, 3), 1);
}

proptest! {
    //
    // TEST 2 — матч следующего раунда питается ровно своими двумя фидерами
    //
    #[test]
    fn next_slot_and_feeders_agree(round in 1u32..10, match_number in 1u32..512) {
        let target = next_slot(round, match_number);
        let (first, second) = feeder_matches(target.match_number);

        prop_assert_eq!(target.round, round + 1);
        prop_assert!(match_number == first || match_number == second);
        let expected = if match_number == first { SlotSide::First } else { SlotSide::Second };
        prop_assert_eq!(target.side, expected);
    }

    //
    // TEST 3 — порядок посева: перестановка, пары суммируются в size + 1
    //
    #[test]
    fn seed_order_pairs_top_with_bottom(exp in 1u32..8) {
        let size = 1u32 << exp;
        let order = seed_order(size);

        let mut sorted = order.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (1..=size).collect::<Vec<_>>());

        for pair in order.chunks(2) {
            prop_assert_eq!(pair[0] + pair[1], size + 1);
        }
    }
}

//
// TEST 4 — известные порядки посева и размеры сетки
//
#[test]
fn seed_order_and_bracket_size() {
    assert_eq!(seed_order(4), vec![1, 4, 2, 3]);
    assert_eq!(seed_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);

    assert_eq!(default_bracket_size(2), 2);
    assert_eq!(default_bracket_size(3), 4);
    assert_eq!(default_bracket_size(5), 8);

    assert!(validate_bracket_size(4, 3).is_ok());
    assert!(validate_bracket_size(4, 1).is_err());
    assert!(validate_bracket_size(6, 5).is_err());
    assert!(validate_bracket_size(4, 5).is_err());
    assert!(validate_bracket_size(8, 3).is_err());
}

//
// TEST 5 — четыре участника: два готовых матча, финал пустой
//
#[test]
fn four_player_build() {
    let (t, events) = build(&["a", "b", "c", "d"]);

    assert_eq!(t.bracket_size, 4);
    assert_eq!(t.round_count(), 2);
    assert_eq!(
        events,
        vec![
            BracketEvent::MatchReady {
                round: 1,
                match_number: 1,
                white: "a".into(),
                black: "d".into(),
            },
            BracketEvent::MatchReady {
                round: 1,
                match_number: 2,
                white: "b".into(),
                black: "c".into(),
            },
        ]
    );

    let final_match = t.bracket_match(2, 1).unwrap();
    assert_eq!(final_match.state, BracketMatchState::Pending);
    assert!(final_match.white.is_none() && final_match.black.is_none());
    assert_eq!(t.participant(&"c".into()).unwrap().seed, 3);
}

//
// TEST 6 — победители занимают места по номеру матча, финал становится готов
//
#[test]
fn winners_fill_final_in_slot_order() {
    let (mut t, _) = build(&["a", "b", "c", "d"]);

    // Матч 2 закончился раньше: его победитель всё равно идёт на второе место.
    let events = play(&mut t, 1, 2, "b");
    assert_eq!(
        events,
        vec![BracketEvent::Advanced {
            round: 1,
            match_number: 2,
            user_id: "b".into(),
            to_match: 1,
            side: SlotSide::Second,
        }]
    );
    assert_eq!(t.bracket_match(2, 1).unwrap().state, BracketMatchState::Pending);
    assert_eq!(t.participant(&"c".into()).unwrap().eliminated_in_round, Some(1));

    let events = play(&mut t, 1, 1, "a");
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        BracketEvent::MatchReady {
            round: 2,
            match_number: 1,
            white: "a".into(),
            black: "b".into(),
        }
    );

    let events = play(&mut t, 2, 1, "a");
    assert_eq!(events, vec![BracketEvent::Champion { user_id: "a".into() }]);
    assert_eq!(t.status, TournamentStatus::Concluded);
    assert_eq!(t.champion, Some("a".into()));
    assert_eq!(t.participant(&"b".into()).unwrap().eliminated_in_round, Some(2));
    assert_eq!(t.remaining_participants().count(), 1);
}

//
// TEST 7 — три участника: первый посев проходит без игры
//
#[test]
fn bye_advances_top_seed() {
    let (t, events) = build(&["a", "b", "c"]);

    assert_eq!(t.bracket_size, 4);
    let bye = t.bracket_match(1, 1).unwrap();
    assert_eq!(bye.state, BracketMatchState::Bye);
    assert_eq!(bye.winner, Some("a".into()));

    assert!(events.contains(&BracketEvent::ByeAdvanced {
        round: 1,
        match_number: 1,
        user_id: "a".into(),
    }));
    assert!(events.contains(&BracketEvent::MatchReady {
        round: 1,
        match_number: 2,
        white: "b".into(),
        black: "c".into(),
    }));

    let final_match = t.bracket_match(2, 1).unwrap();
    assert_eq!(final_match.white, Some("a".into()));
    assert_eq!(final_match.state, BracketMatchState::Pending);
}

//
// TEST 8 — ничья откладывает продвижение до тай-брейка
//
#[test]
fn draw_waits_for_tiebreak() {
    let (mut t, _) = build(&["a", "b", "c", "d"]);
    BracketManager::bind_match(&mut t, 1, 1, MatchId::from("m-1")).unwrap();

    let events = BracketManager::on_match_completed(&mut t, 1, 1, None).unwrap();
    assert_eq!(
        events,
        vec![BracketEvent::AwaitingTiebreak {
            round: 1,
            match_number: 1
        }]
    );
    assert_eq!(t.bracket_match(1, 1).unwrap().state, BracketMatchState::AwaitingTiebreak);
    assert!(t.bracket_match(2, 1).unwrap().white.is_none());

    // Тай-брейк для матча, который его не ждёт, — ошибка без остановки турнира.
    let err = BracketManager::report_tiebreak(&mut t, 1, 2, &"b".into()).unwrap_err();
    assert!(matches!(err, EngineError::BracketInvariantViolation { .. }));
    assert_eq!(t.status, TournamentStatus::InProgress);

    let events = BracketManager::report_tiebreak(&mut t, 1, 1, &"d".into()).unwrap();
    assert_eq!(t.bracket_match(2, 1).unwrap().white, Some("d".into()));
    assert!(matches!(events[0], BracketEvent::Advanced { side: SlotSide::First, .. }));
}

//
// TEST 9 — повторное уведомление с тем же победителем ничего не меняет
//
#[test]
fn duplicate_completion_is_idempotent() {
    let (mut t, _) = build(&["a", "b", "c", "d"]);
    play(&mut t, 1, 1, "a");

    let again =
        BracketManager::on_match_completed(&mut t, 1, 1, Some(&"a".into())).unwrap();
    assert!(again.is_empty());
    assert_eq!(t.status, TournamentStatus::InProgress);
}

//
// TEST 10 — противоречивый итог останавливает турнир
//
#[test]
fn conflicting_result_halts_tournament() {
    let (mut t, _) = build(&["a", "b", "c", "d"]);
    play(&mut t, 1, 1, "a");

    let err = BracketManager::on_match_completed(&mut t, 1, 1, Some(&"d".into())).unwrap_err();
    assert!(matches!(err, EngineError::BracketInvariantViolation { .. }));
    assert_eq!(t.status, TournamentStatus::Halted);
    assert!(t.halted_reason.is_some());

    // Остановленный турнир больше ничего не продвигает.
    BracketManager::bind_match(&mut t, 1, 2, MatchId::from("m-2")).unwrap();
    assert!(BracketManager::on_match_completed(&mut t, 1, 2, Some(&"b".into())).is_err());
    assert!(t.bracket_match(2, 1).unwrap().black.is_none());
}

//
// TEST 11 — победитель не из этого матча
//
#[test]
fn stranger_winner_halts_tournament() {
    let (mut t, _) = build(&["a", "b", "c", "d"]);
    BracketManager::bind_match(&mut t, 1, 1, MatchId::from("m-1")).unwrap();

    let err = BracketManager::on_match_completed(&mut t, 1, 1, Some(&"c".into())).unwrap_err();
    assert!(matches!(err, EngineError::BracketInvariantViolation { .. }));
    assert_eq!(t.status, TournamentStatus::Halted);
}

//
// TEST 12 — некорректная регистрация
//
#[test]
fn invalid_registrations_rejected() {
    assert!(matches!(
        BracketManager::build(spec(&["a"])),
        Err(EngineError::InvalidConfig(_))
    ));
    assert!(matches!(
        BracketManager::build(spec(&["a", "b", "a"])),
        Err(EngineError::InvalidConfig(_))
    ));

    let mut oversized = spec(&["a", "b", "c"]);
    oversized.bracket_size = Some(8);
    assert!(matches!(
        BracketManager::build(oversized),
        Err(EngineError::InvalidConfig(_))
    ));
}

//
// TEST 13 — жеребьёвка с seed воспроизводима
//
#[test]
fn seeded_shuffle_is_reproducible() {
    let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let mut first = spec(&names);
    first.seeding = Seeding::Shuffled { seed: Some(42) };
    let mut second = spec(&names);
    second.seeding = Seeding::Shuffled { seed: Some(42) };

    let (t1, _) = BracketManager::build(first).unwrap();
    let (t2, _) = BracketManager::build(second).unwrap();
    assert_eq!(t1.participants, t2.participants);
    assert_eq!(t1.rounds, t2.rounds);
}

//
// TEST 14 — ready_matches видит только матчи без сессии
//
#[test]
fn ready_matches_skip_bound_ones() {
    let (mut t, _) = build(&["a", "b", "c", "d"]);
    assert_eq!(BracketManager::ready_matches(&t).len(), 2);

    BracketManager::bind_match(&mut t, 1, 1, MatchId::from("m-1")).unwrap();
    let ready = BracketManager::ready_matches(&t);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].match_number, 2);
    assert_eq!(
        t.find_by_match_id(&MatchId::from("m-1")).map(|bm| bm.state),
        Some(BracketMatchState::InPlay)
    );

    // Повторная привязка того же места запрещена.
    assert!(BracketManager::bind_match(&mut t, 1, 1, MatchId::from("m-9")).is_err());
}

//
// TEST 15 — жеребьёвка: перестановка, воспроизводимая по seed
//
#[test]
fn arrange_shuffles_reproducibly() {
    let entrants: Vec<UserId> = (0..32).map(|i| UserId::from(format!("u{i}"))).collect();

    let first = seeding::arrange(entrants.clone(), Seeding::Shuffled { seed: Some(7) });
    let second = seeding::arrange(entrants.clone(), Seeding::Shuffled { seed: Some(7) });
    assert_eq!(first, second);

    let mut sorted = first.clone();
    sorted.sort();
    let mut expected = entrants.clone();
    expected.sort();
    assert_eq!(sorted, expected);

    let unseeded = seeding::arrange(entrants.clone(), Seeding::Shuffled { seed: None });
    assert_eq!(unseeded.len(), entrants.len());

    assert_eq!(seeding::arrange(entrants.clone(), Seeding::EntryOrder), entrants);
}
