//! Tests for server operations driven directly, without the dispatch queue.
//!
//! Sessions answer asynchronously, so tests call `settle` where they need
//! the directory to reflect what sessions have done.

use chessfor4::{
    ClientRef, CoreEvent, Lifecycle, Operation, RecordingSink, Server, ServerConfig,
    ServerMessage,
};
use chessfor4_rules::{MoveDescription, Position, Team};
use std::sync::Arc;
use tokio::sync::mpsc;

fn server(config: ServerConfig) -> (Server, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    (Server::new(config, sink.clone()), sink)
}

fn client() -> (ClientRef, mpsc::Receiver<Vec<u8>>) {
    ClientRef::new(64)
}

fn drain(rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(bytes) = rx.try_recv() {
        messages.push(serde_json::from_slice(&bytes).expect("valid envelope"));
    }
    messages
}

#[tokio::test]
async fn test_set_nick_is_unique_across_lobby() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, mut rx_a) = client();
    let (b, _rx_b) = client();
    let (c, _rx_c) = client();

    assert_eq!(server.set_nick(&a, "Alice").await, "Alice");
    assert_eq!(server.set_nick(&b, "  Alice ").await, "Alice2");
    assert_eq!(server.set_nick(&a, "Alice").await, "Alice");
    assert_eq!(server.set_nick(&c, "   ").await, "Player");

    let profile_id = server.lobby().get(a.id()).expect("profile").id().clone();
    match drain(&mut rx_a).first() {
        Some(ServerMessage::Secret { id, secret }) => {
            assert_eq!(id, &profile_id);
            assert!(!secret.is_empty());
        }
        other => panic!("expected secret, got {:?}", other),
    }
}

#[tokio::test]
async fn test_join_full_game_fails_and_count_unchanged() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (owner, _rx) = client();
    let id = server.create_game(&owner).await.expect("game created");

    let mut receivers = Vec::new();
    for _ in 0..3 {
        let (joiner, rx) = client();
        assert!(server.join_game(&id, &joiner).await);
        receivers.push(rx);
    }
    server.settle().await;
    let (late, mut late_rx) = client();

    assert!(server.join_game(&id, &late).await);
    server.settle().await;

    assert_eq!(
        drain(&mut late_rx),
        vec![ServerMessage::error("Could not join game", "Server is full")]
    );
    let handle = server.game_by_client_owner(owner.id()).expect("owned game");
    let view = handle.snapshot().await.expect("running");
    assert_eq!(view.players().len(), 4);
    assert_eq!(server.directory().get(&id).expect("entry").members().len(), 4);
    assert!(server.directory().pending_for(late.id()).is_none());
}

#[tokio::test]
async fn test_join_unknown_game_replies_not_found() {
    let (mut server, sink) = server(ServerConfig::default());
    let (a, mut rx) = client();

    assert!(!server.join_game("missing", &a).await);

    assert_eq!(
        drain(&mut rx),
        vec![ServerMessage::error("Could not join game", "Game not found")]
    );
    assert_eq!(
        sink.count(|e| matches!(
            e,
            CoreEvent::NotFound {
                operation: Operation::JoinGame,
                ..
            }
        )),
        1
    );
}

#[tokio::test]
async fn test_seated_client_cannot_create_or_join_again() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, mut rx_a) = client();
    let (b, _rx_b) = client();
    server.create_game(&a).await.expect("created");
    let other = server.create_game(&b).await.expect("created");
    drain(&mut rx_a);

    assert!(server.create_game(&a).await.is_none());
    assert!(!server.join_game(&other, &a).await);
    assert_eq!(server.directory().len(), 2);
}

#[tokio::test]
async fn test_disconnect_last_player_removes_session_and_profile() {
    let (mut server, sink) = server(ServerConfig::default());
    let (a, _rx) = client();
    server.set_nick(&a, "Alice").await;
    let id = server.create_game(&a).await.expect("created");
    let handle = server.game_by_client_owner(a.id()).expect("owned").clone();
    assert_eq!(server.directory().len(), 1);

    server.disconnect(&a).await;
    server.settle().await;

    assert_eq!(server.directory().len(), 0);
    assert!(server.lobby().get(a.id()).is_none());
    assert!(handle.is_stopped());
    assert_eq!(
        sink.count(|e| matches!(e, CoreEvent::SessionRemoved { session } if *session == id)),
        1
    );
}

#[tokio::test]
async fn test_disconnect_shares_state_with_remaining_players() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, _rx_a) = client();
    let (b, _rx_b) = client();
    let id = server.create_game(&a).await.expect("created");
    assert!(server.join_game(&id, &b).await);
    server.settle().await;

    server.disconnect(&b).await;
    server.settle().await;

    let entry = server.directory().get(&id).expect("still registered");
    assert_eq!(entry.members(), &vec![a.id()]);
    let view = entry.handle().snapshot().await.expect("running");
    assert_eq!(view.players().len(), 1);
    assert_eq!(server.lobby().len(), 1);
}

#[tokio::test]
async fn test_list_of_games_reports_player_counts() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, _rx_a) = client();
    let (b, _rx_b) = client();
    let (c, _rx_c) = client();
    server.set_nick(&a, "Alice").await;
    server.set_nick(&b, "Bob").await;
    server.create_game(&a).await.expect("created");
    let second = server.create_game(&b).await.expect("created");
    assert!(server.join_game(&second, &c).await);
    server.settle().await;

    let listing = server.list_of_games();

    let rows: Vec<_> = listing
        .games()
        .iter()
        .map(|g| (g.title().as_str(), g.players().as_str()))
        .collect();
    assert_eq!(rows, vec![("Alice's game", "1/4"), ("Bob's game", "2/4")]);
}

#[tokio::test]
async fn test_notify_lobby_skips_seated_clients() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, mut rx_a) = client();
    let (idle, mut rx_idle) = client();
    server.get_or_create_profile(&idle);
    server.create_game(&a).await.expect("created");
    server.game_by_client_owner(a.id()).expect("owned").snapshot().await.expect("running");
    drain(&mut rx_a);

    server.notify_lobby();

    assert!(drain(&mut rx_a).is_empty());
    match drain(&mut rx_idle).as_slice() {
        [ServerMessage::Games { games }] => assert_eq!(games.len(), 1),
        other => panic!("expected one listing, got {:?}", other),
    }
}

#[tokio::test]
async fn test_change_seat_without_session_is_noop() {
    let (mut server, sink) = server(ServerConfig::default());
    let (a, mut rx) = client();
    server.get_or_create_profile(&a);

    server.change_seat(&a, 2).await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(server.directory().len(), 0);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            CoreEvent::NotFound {
                operation: Operation::ChangeSeat,
                ..
            }
        )),
        1
    );
}

#[tokio::test]
async fn test_start_requires_full_table_by_default() {
    let (mut server, sink) = server(ServerConfig::default());
    let (a, _rx_a) = client();
    let (b, _rx_b) = client();
    let id = server.create_game(&a).await.expect("created");
    assert!(server.join_game(&id, &b).await);
    server.settle().await;

    server.start_game(&b).await;
    server.start_game(&a).await;

    let view = server
        .game_by_client_owner(a.id())
        .expect("owned")
        .snapshot()
        .await
        .expect("running");
    assert_eq!(*view.lifecycle(), Lifecycle::Waiting);
    assert_eq!(sink.count(|e| matches!(e, CoreEvent::StartRefused { .. })), 1);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            CoreEvent::NotFound {
                operation: Operation::StartGame,
                ..
            }
        )),
        1
    );
}

#[tokio::test]
async fn test_early_start_and_moves_through_server() {
    let config = ServerConfig::default().with_can_start_before_full(true);
    let (mut server, sink) = server(config);
    let (a, _rx_a) = client();
    let (b, mut rx_b) = client();
    let id = server.create_game(&a).await.expect("created");
    assert!(server.join_game(&id, &b).await);

    server.start_game(&a).await;
    let out_of_turn = MoveDescription::new(Position::new(1, 5), Position::new(3, 5));
    server.move_piece(&b, out_of_turn).await;
    server
        .move_piece(&a, MoveDescription::new(Position::new(5, 12), Position::new(5, 10)))
        .await;
    server.move_piece(&b, out_of_turn).await;

    let view = server
        .game_by_client_playing(b.id())
        .expect("playing")
        .snapshot()
        .await
        .expect("running");
    assert_eq!(*view.lifecycle(), Lifecycle::Active);
    assert_eq!(*view.turn(), Some(Team::North));
    assert!(view.board().piece_at(Position::new(3, 5)).is_some());
    assert_eq!(sink.count(|e| matches!(e, CoreEvent::MoveApplied { .. })), 2);
    assert!(drain(&mut rx_b).iter().any(|m| matches!(
        m,
        ServerMessage::Error { title, .. } if title == "Illegal move"
    )));
}

#[tokio::test]
async fn test_change_seat_through_server() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, _rx_a) = client();
    let (b, mut rx_b) = client();
    let id = server.create_game(&a).await.expect("created");
    assert!(server.join_game(&id, &b).await);

    server.change_seat(&b, 4).await;
    server.change_seat(&b, 1).await;

    let view = server
        .game_by_client_playing(b.id())
        .expect("playing")
        .snapshot()
        .await
        .expect("running");
    let b_profile = server.lobby().get(b.id()).expect("profile").id().clone();
    let seat = view
        .players()
        .iter()
        .find(|p| *p.id() == b_profile)
        .map(|p| *p.team());
    assert_eq!(seat, Some(Team::East));
    assert!(drain(&mut rx_b).iter().any(|m| matches!(
        m,
        ServerMessage::Error { title, .. } if title == "Could not change seat"
    )));
}

#[tokio::test]
async fn test_pending_join_blocks_second_join_and_routes_moves() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, _rx_a) = client();
    let (b, _rx_b) = client();
    let (c, mut rx_c) = client();
    let first = server.create_game(&a).await.expect("created");
    let second = server.create_game(&b).await.expect("created");

    assert!(server.join_game(&first, &c).await);
    assert_eq!(
        server.game_by_client_playing(c.id()).map(|h| h.id().clone()),
        Some(first.clone())
    );
    assert!(!server.join_game(&second, &c).await);
    server.settle().await;

    assert!(server.directory().get(&first).expect("entry").has_member(c.id()));
    assert!(!server.directory().get(&second).expect("entry").has_member(c.id()));
    assert!(drain(&mut rx_c).contains(&ServerMessage::error(
        "Could not join game",
        "You are already in a game"
    )));
}

#[tokio::test]
async fn test_winner_can_create_after_last_opponent_leaves() {
    let config = ServerConfig::default().with_can_start_before_full(true);
    let (mut server, sink) = server(config);
    let (a, mut rx_a) = client();
    let (b, _rx_b) = client();
    let finished = server.create_game(&a).await.expect("created");
    assert!(server.join_game(&finished, &b).await);
    server.settle().await;
    server.start_game(&a).await;
    server.disconnect(&b).await;
    server.settle().await;
    assert!(server.directory().get(&finished).expect("entry").is_over());
    drain(&mut rx_a);

    let fresh = server.create_game(&a).await.expect("winner may host again");
    server.settle().await;

    assert!(server.directory().get(&finished).is_none());
    assert_eq!(server.directory().len(), 1);
    assert_eq!(
        server.directory().by_member(a.id()).map(|e| e.handle().id().clone()),
        Some(fresh.clone())
    );
    assert_eq!(server.game_by_client_owner(a.id()).map(|h| h.id().clone()), Some(fresh));
    assert!(!drain(&mut rx_a).iter().any(|m| matches!(
        m,
        ServerMessage::Error { title, .. } if title == "Could not create game"
    )));
    assert_eq!(
        sink.count(|e| matches!(e, CoreEvent::GameFinished { winner: Some(Team::South), .. })),
        1
    );
    assert_eq!(sink.count(|e| matches!(e, CoreEvent::AlreadySeated { .. })), 0);
}

#[tokio::test]
async fn test_finished_game_members_hear_lobby_updates() {
    let config = ServerConfig::default().with_can_start_before_full(true);
    let (mut server, _sink) = server(config);
    let (a, mut rx_a) = client();
    let (b, _rx_b) = client();
    let id = server.create_game(&a).await.expect("created");
    assert!(server.join_game(&id, &b).await);
    server.settle().await;
    server.start_game(&a).await;
    server.disconnect(&b).await;
    server.settle().await;
    drain(&mut rx_a);

    server.notify_lobby();

    assert!(matches!(
        drain(&mut rx_a).as_slice(),
        [ServerMessage::Games { .. }]
    ));
}

#[tokio::test]
async fn test_nick_change_reaches_seated_players() {
    let (mut server, _sink) = server(ServerConfig::default());
    let (a, _rx_a) = client();
    let (b, mut rx_b) = client();
    let id = server.create_game(&a).await.expect("created");
    assert!(server.join_game(&id, &b).await);
    server.settle().await;
    drain(&mut rx_b);

    server.set_nick(&a, "Alice").await;
    let view = server
        .game_by_client_owner(a.id())
        .expect("owned")
        .snapshot()
        .await
        .expect("running");

    let a_profile = server.lobby().get(a.id()).expect("profile").id().clone();
    let nick = view
        .players()
        .iter()
        .find(|p| *p.id() == a_profile)
        .map(|p| p.nick().clone());
    assert_eq!(nick.as_deref(), Some("Alice"));
    assert!(drain(&mut rx_b).iter().any(|m| matches!(
        m,
        ServerMessage::State { game } if game.players().iter().any(|p| p.nick() == "Alice")
    )));
}
