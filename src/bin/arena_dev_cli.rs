// src/bin/arena_dev_cli.rs

use std::sync::Arc;

use match_engine::api::{self, build_schema, Command, CommandResponse};
use match_engine::domain::{MatchId, Side, TournamentStatus, UserId};
use match_engine::engine::{ArenaEngine, CreateMatchRequest, CreateTournamentRequest, UncheckedRules};
use match_engine::infra::{IdGenerator, InMemoryMatchStore, MatchStore};
use match_engine::time_ctrl::{SystemTimeSource, TimeControl, TimeSource};
use match_engine::tournament::Seeding;
use match_engine::EngineConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("match_engine=info")),
        )
        .init();

    println!("=== ARENA DEV CLI ===\n");

    let store: Arc<dyn MatchStore> = Arc::new(InMemoryMatchStore::new());
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::new());
    let engine = ArenaEngine::new(
        EngineConfig::default(),
        store.clone(),
        Arc::new(UncheckedRules),
        time.clone(),
    )?
    .with_ids(IdGenerator::with_prefix("dev-"));

    casual_match(&engine).await?;
    knockout(&engine).await?;

    // === ОТЧЁТ ===
    let schema = build_schema(store, time);
    let report = schema
        .execute("{ todaysMatches { gameId status winnerId endReason } todaysTournaments { name status champion } }")
        .await;
    println!("\nОтчёт за сегодня:\n{}", serde_json::to_string_pretty(&report.data)?);

    Ok(())
}

/// Обычный матч: вход, пара ходов, сдача, повторный маячок.
async fn casual_match(engine: &ArenaEngine) -> Result<(), Box<dyn std::error::Error>> {
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let created = api::execute(
        engine,
        Command::CreateMatch(CreateMatchRequest {
            creator: alice.clone(),
            side: Side::White,
            time_control: TimeControl::sudden_death(600),
            wager: Some(10),
        }),
    )
    .await?;

    let CommandResponse::MatchCreated(summary) = created else {
        return Err("неожиданный ответ на создание матча".into());
    };
    let match_id = MatchId::new(summary.game_id);
    println!("Создан матч {} (alice белыми, 600s)", match_id);

    let joined = engine.join_match(&match_id, &bob).await?;
    println!("bob сел: {:?}", joined);

    for (who, mv) in [(&alice, "e2e4"), (&bob, "e7e5"), (&alice, "g1f3")] {
        let outcome = engine.submit_move(&match_id, who, mv).await?;
        println!("  {} ходит {}: {:?}", who, mv, outcome);
    }

    let ack = engine.resign(&match_id, &bob).await?;
    println!(
        "bob сдался: applied={}, победитель {:?}, причина {:?}",
        ack.applied, ack.outcome.winner_id, ack.outcome.end_reason
    );

    // Закрывающийся клиент успел отправить маячок — это дубликат.
    let beacon = api::handle_beacon(
        engine,
        &match_id,
        r#"{"winnerId":"alice","reason":"disconnection"}"#,
    )
    .await?;
    println!("Поздний маячок: applied={}, status={}", beacon.applied, beacon.status);

    Ok(())
}

/// Турнир на 4 участника: белые всегда выигрывают (чёрные сдаются).
async fn knockout(engine: &ArenaEngine) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== ТУРНИР НА 4 УЧАСТНИКА ===");

    let participants: Vec<UserId> = ["ann", "ben", "cat", "dan"].into_iter().map(UserId::from).collect();
    let tournament = engine
        .create_tournament(CreateTournamentRequest {
            name: "Evening Blitz".to_string(),
            participants,
            bracket_size: None,
            seeding: Seeding::EntryOrder,
            time_control: TimeControl::new(180, 2),
        })
        .await?;
    let tid = tournament.id.clone();
    println!("Турнир {} создан, сетка {}", tid, tournament.bracket_size);

    loop {
        let tournament = engine.tournament(&tid).await?;
        if tournament.status != TournamentStatus::InProgress {
            println!(
                "Турнир завершён: status={}, чемпион {:?}",
                tournament.status.as_str(),
                tournament.champion
            );
            break;
        }

        let in_play: Vec<_> = tournament
            .rounds
            .iter()
            .flat_map(|r| r.matches.iter())
            .filter_map(|bm| bm.match_id.clone().map(|id| (bm.round, bm.match_number, id)))
            .filter(|(_, _, id)| engine.registry().contains(id))
            .collect();

        if in_play.is_empty() {
            println!("Нет живых матчей, а турнир не завершён — остановка.");
            break;
        }

        for (round, match_number, match_id) in in_play {
            let view = engine.start_match(&match_id).await?;
            let black = view
                .black_player_id
                .clone()
                .ok_or("у турнирного матча нет чёрных")?;
            let ack = engine.resign(&match_id, &black).await?;
            println!(
                "  раунд {} матч {}: победил {:?}",
                round, match_number, ack.outcome.winner_id
            );
        }
    }

    Ok(())
}
