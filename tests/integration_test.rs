use std::sync::Arc;

use chrono::{Duration, Utc};

use stadtlandfluss::dictionary::dictionary_with_terms;
use stadtlandfluss::game::{GameService, JoinOutcome};
use stadtlandfluss::leaderboard::InMemoryLeaderboard;
use stadtlandfluss::store::{InMemoryRoundStore, RoundStateStore};
use stadtlandfluss::types::{GameConfig, Phase};

async fn service_with_terms(entries: &[(&str, &[&str])]) -> GameService {
    let store: Arc<dyn RoundStateStore> = Arc::new(InMemoryRoundStore::new());
    let dictionary = Arc::new(dictionary_with_terms(entries).await);
    let leaderboard = Arc::new(InMemoryLeaderboard::new());
    GameService::new(store, dictionary, leaderboard, GameConfig::default())
}

/// Start a round with the given participants and a pinned letter. Rounds
/// normally pick a random letter, which tests can't assert against.
async fn setup_round(service: &GameService, users: &[&str], letter: char) {
    service.join(&users[0].to_string()).await.unwrap();
    let mut round = service.store.active_round().await.unwrap().unwrap();
    round.letter = letter;
    round.participants = users.iter().map(|u| u.to_string()).collect();
    service.store.set_active_round(round).await.unwrap();
}

/// Rewind the current phase window so the next request sees it as expired.
async fn expire_phase(service: &GameService) {
    let mut round = service.store.active_round().await.unwrap().unwrap();
    round.phase_end = Utc::now() - Duration::seconds(1);
    service.store.set_active_round(round).await.unwrap();
}

async fn category_id(service: &GameService, name: &str) -> String {
    service
        .dictionary
        .categories()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.name == name)
        .expect("category should exist")
        .id
}

/// End-to-end flow without a voting phase: everyone's answers either match
/// the dictionary or fail the letter gate, so round expiry finalizes
/// directly into the leaderboard.
#[tokio::test]
async fn test_full_round_flow() {
    let service = service_with_terms(&[
        ("Stadt", &["Berlin", "Hamburg"]),
        ("Land", &["Belgien", "Deutschland"]),
    ])
    .await;

    // 1. Setup: round with letter B, two players
    setup_round(&service, &["alice", "bob"], 'B').await;
    let stadt = category_id(&service, "Stadt").await;
    let land = category_id(&service, "Land").await;

    let round = service.current_round().await.unwrap().expect("round runs");
    assert_eq!(round.phase, Phase::Playing);
    assert_eq!(round.letter, 'B');

    // 2. Submissions: both pick Berlin, only Alice answers Land correctly
    let sub = service
        .submit(&"alice".to_string(), &stadt, "Berlin")
        .await
        .unwrap();
    assert!(sub.is_valid);
    assert!(sub.matched_term_id.is_some());
    assert_eq!(sub.similarity, 1.0);

    service
        .submit(&"bob".to_string(), &stadt, "Berlin")
        .await
        .unwrap();
    service
        .submit(&"alice".to_string(), &land, "Belgien")
        .await
        .unwrap();

    // Hamburg fails the letter gate in a B round
    let rejected = service
        .submit(&"bob".to_string(), &land, "Hamburg")
        .await
        .unwrap();
    assert!(!rejected.is_valid);
    assert_eq!(rejected.similarity, 0.0);

    // 3. Expiry: no unknowns, so the round finalizes straight away
    expire_phase(&service).await;
    assert!(service.current_round().await.unwrap().is_none());

    // 4. Scores: shared Berlin earns base points, Alice's unique Belgien
    // earns the bonus on top
    assert_eq!(service.my_total(&"alice".to_string()).await.unwrap(), 25);
    assert_eq!(service.my_total(&"bob".to_string()).await.unwrap(), 10);

    let result = service
        .my_last_result(&"alice".to_string())
        .await
        .unwrap()
        .expect("alice has a last result");
    assert_eq!(result.round, round.number);
    assert_eq!(result.gained_points, 25);
    assert_eq!(result.valid_count, 2);

    let (highscores, live) = service.scoreboard(10).await.unwrap();
    assert_eq!(highscores.len(), 2);
    assert_eq!(highscores[0].user_id, "alice");
    assert_eq!(highscores[0].total_points, 25);
    assert_eq!(highscores[1].user_id, "bob");
    assert!(live.is_empty());
}

/// A submission the dictionary doesn't recognize goes through the voting
/// phase; a majority approval makes it count.
#[tokio::test]
async fn test_unknown_term_voting_flow() {
    let service = service_with_terms(&[("Land", &["Belgien"])]).await;
    setup_round(&service, &["alice", "bob", "carol"], 'B').await;
    let land = category_id(&service, "Land").await;

    // Alice's answer is nowhere near any known term but passes the letter gate
    let sub = service
        .submit(&"alice".to_string(), &land, "Bxqzien")
        .await
        .unwrap();
    assert!(!sub.is_valid);
    assert!(sub.matched_term_id.is_none());

    service
        .submit(&"bob".to_string(), &land, "Belgien")
        .await
        .unwrap();

    // Playing expiry with an unresolved term opens the voting phase
    expire_phase(&service).await;
    let round = service.current_round().await.unwrap().expect("round runs");
    assert_eq!(round.phase, Phase::Voting);

    let unknowns = service.unknown_terms(&"bob".to_string()).await.unwrap();
    assert_eq!(unknowns.len(), 1);
    assert_eq!(unknowns[0].normalized_text, "bxqzien");

    // 2 approvals vs 1 rejection
    service
        .vote_unknown(&"bob".to_string(), &land, "Bxqzien", true)
        .await
        .unwrap();
    service
        .vote_unknown(&"carol".to_string(), &land, "bxqzien", true)
        .await
        .unwrap();
    let entry = service
        .vote_unknown(&"alice".to_string(), &land, "bxqzien", false)
        .await
        .unwrap();
    assert_eq!(entry.approvals, 2);
    assert_eq!(entry.rejections, 1);

    // Voting expiry finalizes; the approved term counts and is unique
    expire_phase(&service).await;
    assert!(service.current_round().await.unwrap().is_none());

    assert_eq!(service.my_total(&"alice".to_string()).await.unwrap(), 15);
    assert_eq!(service.my_total(&"bob".to_string()).await.unwrap(), 15);
    assert_eq!(service.my_total(&"carol".to_string()).await.unwrap(), 0);
}

/// Joining mid-round queues the caller; finalization starts the next round
/// with exactly the waiting players.
#[tokio::test]
async fn test_queued_joiner_plays_next_round() {
    let service = service_with_terms(&[("Stadt", &["Berlin"])]).await;

    let first = service.join(&"alice".to_string()).await.unwrap();
    let first_round = match first {
        JoinOutcome::Joined(round) => round,
        other => panic!("expected Joined, got {:?}", other),
    };

    match service.join(&"bob".to_string()).await.unwrap() {
        JoinOutcome::Queued { waiting, .. } => assert_eq!(waiting, 1),
        other => panic!("expected Queued, got {:?}", other),
    }

    expire_phase(&service).await;
    let next = service.current_round().await.unwrap().expect("next round");
    assert_eq!(next.number, first_round.number + 1);
    assert!(next.is_participant("bob"));
    assert!(!next.is_participant("alice"));
}

/// Expiry-driven finalization applies exactly once even when several
/// requests race past the deadline.
#[tokio::test]
async fn test_concurrent_expiry_scores_once() {
    let service = Arc::new(service_with_terms(&[("Stadt", &["Berlin"])]).await);
    setup_round(&service, &["alice"], 'B').await;
    let stadt = category_id(&service, "Stadt").await;

    service
        .submit(&"alice".to_string(), &stadt, "Berlin")
        .await
        .unwrap();
    expire_phase(&service).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(
            async move { service.current_round().await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(service.my_total(&"alice".to_string()).await.unwrap(), 15);
}
