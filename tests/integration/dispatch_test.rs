// tests/integration/dispatch_test.rs

use super::test_helpers::*;
use bytes::{BufMut, Bytes, BytesMut};
use serverhub::connection::SessionState;
use serverhub::core::events::HubEvent;
use serverhub::core::hub::Hub;
use serverhub::core::protocol::{CommandType, Packet, PlayerInfo, RoomSettings};

const ROOM: u32 = 7;

fn u32_payload(value: u32) -> Bytes {
    Bytes::copy_from_slice(&value.to_le_bytes())
}

fn start_level_payload(difficulty: u8, duration: f32) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(difficulty);
    buf.put_slice(&song(duration).encode());
    buf.freeze()
}

/// A hub with a running event loop and `alice` (id 1) seated in room 7.
async fn seated() -> (TestContext, TestClient) {
    let mut ctx = TestContext::new();
    ctx.registry.add_room(ROOM, false);
    ctx.spawn_hub();

    let mut client = ctx.connect(&player("alice", 1)).await;
    client
        .send(Packet::new(CommandType::JoinRoom, u32_payload(ROOM)))
        .await;
    let session = ctx.session(1);
    ctx.eventually("alice to enter the room", || {
        session.state() == SessionState::InRoom(ROOM)
    })
    .await;
    (ctx, client)
}

#[tokio::test]
async fn test_start_level_adds_grace_to_the_duration() {
    let (ctx, mut client) = seated().await;

    client
        .send(Packet::new(
            CommandType::StartLevel,
            start_level_payload(2, 120.0),
        ))
        .await;
    client.barrier().await;

    let calls = ctx.registry.calls();
    assert!(calls.contains(&RoomCall::StartLevel {
        room: ROOM,
        difficulty: 2,
        song: song(122.5),
    }));
}

#[tokio::test]
async fn test_room_commands_are_ignored_in_the_lobby() {
    let ctx = TestContext::new();
    ctx.registry.add_room(ROOM, false);
    let mut client = ctx.connect(&player("alice", 1)).await;

    client
        .send(Packet::new(
            CommandType::StartLevel,
            start_level_payload(2, 120.0),
        ))
        .await;
    client.send(Packet::empty(CommandType::GetRoomInfo)).await;
    client.send(Packet::empty(CommandType::DestroyRoom)).await;
    client
        .send(Packet::new(CommandType::PlayerReady, vec![1u8]))
        .await;
    // The barrier reply must be the very next packet: nothing above replied.
    client.barrier().await;

    assert!(ctx.registry.calls().is_empty());
}

#[tokio::test]
async fn test_room_commands_are_ignored_for_unknown_rooms() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;
    ctx.session(1).enter_room(99);

    client.send(Packet::empty(CommandType::GetRoomInfo)).await;
    client.send(Packet::empty(CommandType::DestroyRoom)).await;
    client.barrier().await;
    assert!(ctx.registry.calls().is_empty());
}

#[tokio::test]
async fn test_join_room_forwards_password_only_when_required() {
    let mut ctx = TestContext::new();
    ctx.registry.add_room(3, true);
    ctx.registry.add_room(4, false);
    let mut client = ctx.connect(&player("alice", 1)).await;

    let mut with_password = BytesMut::new();
    with_password.put_u32_le(3);
    with_password.put_u32_le(6);
    with_password.put_slice(b"secret");
    client
        .send(Packet::new(CommandType::JoinRoom, with_password.freeze()))
        .await;

    match ctx.next_event().await {
        HubEvent::ClientJoinedRoom {
            room_id, password, ..
        } => {
            assert_eq!(room_id, 3);
            assert_eq!(password, "secret");
        }
        other => panic!("unexpected event {other:?}"),
    }

    let mut trailing = BytesMut::new();
    trailing.put_u32_le(4);
    trailing.put_slice(b"ignored");
    client
        .send(Packet::new(CommandType::JoinRoom, trailing.freeze()))
        .await;
    match ctx.next_event().await {
        HubEvent::ClientJoinedRoom {
            room_id, password, ..
        } => {
            assert_eq!(room_id, 4);
            assert_eq!(password, "");
        }
        other => panic!("unexpected event {other:?}"),
    }

    // The dispatcher never changes the state itself.
    assert_eq!(ctx.session(1).state(), SessionState::Lobby);
}

#[tokio::test]
async fn test_rejected_join_keeps_player_in_lobby() {
    let mut ctx = TestContext::new();
    ctx.registry.add_room_with(5, false, false);
    ctx.spawn_hub();
    let mut client = ctx.connect(&player("alice", 1)).await;

    client
        .send(Packet::new(CommandType::JoinRoom, u32_payload(5)))
        .await;
    let registry = ctx.registry.clone();
    ctx.eventually("the join attempt", || {
        registry.calls().iter().any(|c| matches!(c, RoomCall::Join { .. }))
    })
    .await;
    assert_eq!(ctx.session(1).state(), SessionState::Lobby);
}

#[tokio::test]
async fn test_leave_room_notifies_and_returns_to_lobby() {
    let (ctx, mut client) = seated().await;

    client.send(Packet::empty(CommandType::LeaveRoom)).await;
    client.barrier().await;
    let session = ctx.session(1);
    ctx.eventually("alice to return to the lobby", || {
        session.state() == SessionState::Lobby
    })
    .await;

    let registry = ctx.registry.clone();
    ctx.eventually("the room to see alice leave", || {
        registry.calls().contains(&RoomCall::Leave {
            room: ROOM,
            player: 1,
        })
    })
    .await;
}

#[tokio::test]
async fn test_leave_sent_before_the_join_is_applied_wins() {
    let mut ctx = TestContext::new();
    ctx.registry.add_room(3, false);
    let mut client = ctx.connect(&player("alice", 1)).await;

    client
        .send(Packet::new(CommandType::JoinRoom, u32_payload(3)))
        .await;
    client.send(Packet::empty(CommandType::LeaveRoom)).await;
    client.barrier().await;

    let join = ctx.next_event().await;
    let leave = ctx.next_event().await;
    let (_events_tx, unused) = tokio::sync::mpsc::unbounded_channel();
    let hub = Hub::new(ctx.state.clone(), unused);
    hub.handle(join).await;
    hub.handle(leave).await;

    assert_eq!(ctx.session(1).state(), SessionState::Lobby);
    assert!(
        !ctx.registry
            .calls()
            .iter()
            .any(|c| matches!(c, RoomCall::Join { .. })),
        "a superseded join reached the room"
    );
}

#[tokio::test]
async fn test_only_the_latest_join_is_applied() {
    let mut ctx = TestContext::new();
    ctx.registry.add_room(3, false);
    ctx.registry.add_room(4, false);
    ctx.spawn_hub();
    let mut client = ctx.connect(&player("alice", 1)).await;

    client
        .send(Packet::new(CommandType::JoinRoom, u32_payload(3)))
        .await;
    client
        .send(Packet::new(CommandType::JoinRoom, u32_payload(4)))
        .await;
    let session = ctx.session(1);
    ctx.eventually("alice to enter room 4", || {
        session.state() == SessionState::InRoom(4)
    })
    .await;

    let calls = ctx.registry.calls();
    let joined_3 = calls.iter().any(|c| matches!(c, RoomCall::Join { room: 3, .. }));
    let left_3 = calls.contains(&RoomCall::Leave { room: 3, player: 1 });
    assert_eq!(joined_3, left_3, "room 3 kept a member: {calls:?}");
}

#[tokio::test]
async fn test_start_level_moves_the_room_into_the_game() {
    let (ctx, mut alice) = seated().await;
    let mut bob = ctx.connect(&player("bob", 2)).await;
    bob.send(Packet::new(CommandType::JoinRoom, u32_payload(ROOM)))
        .await;
    let bob_session = ctx.session(2);
    ctx.eventually("bob to enter the room", || {
        bob_session.state() == SessionState::InRoom(ROOM)
    })
    .await;
    let carol = ctx.connect(&player("carol", 3)).await;

    alice
        .send(Packet::new(
            CommandType::StartLevel,
            start_level_payload(1, 60.0),
        ))
        .await;
    alice.barrier().await;
    assert_eq!(ctx.session(1).state(), SessionState::InGame(ROOM));
    assert_eq!(bob_session.state(), SessionState::InGame(ROOM));
    assert_eq!(ctx.session(3).state(), SessionState::Lobby);

    alice
        .send(Packet::new(CommandType::SetSelectedSong, song(90.0).encode()))
        .await;
    alice.barrier().await;
    assert_eq!(ctx.session(1).state(), SessionState::InRoom(ROOM));
    assert_eq!(bob_session.state(), SessionState::InRoom(ROOM));
    drop(carol);
}

#[tokio::test]
async fn test_create_room_replies_with_the_new_id() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;

    let settings = RoomSettings {
        name: "Expert+ only".into(),
        use_password: false,
        password: String::new(),
        max_players: 5,
        extra: Bytes::new(),
    };
    client
        .send(Packet::new(CommandType::CreateRoom, settings.encode()))
        .await;

    let reply = client.recv().await;
    assert_eq!(reply.command(), Some(CommandType::CreateRoom));
    assert_eq!(&reply.payload[..], &CREATED_ROOM_ID.to_le_bytes());
    assert_eq!(
        ctx.registry.calls(),
        vec![RoomCall::Create {
            owner: 1,
            name: "Expert+ only".into()
        }]
    );
}

#[tokio::test]
async fn test_room_info_includes_songs_by_default() {
    let (ctx, mut client) = seated().await;

    for (payload, flag) in [
        (Bytes::new(), 1u8),
        (Bytes::from_static(&[1]), 1),
        (Bytes::from_static(&[0]), 0),
    ] {
        client
            .send(Packet::new(CommandType::GetRoomInfo, payload))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply.command(), Some(CommandType::GetRoomInfo));
        assert_eq!(reply.payload[0], flag);
        assert_eq!(&reply.payload[1..], b"room-7");
    }

    let infos: Vec<_> = ctx
        .registry
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RoomCall::Info { .. }))
        .collect();
    assert_eq!(
        infos,
        vec![
            RoomCall::Info { room: ROOM, include_songs: true },
            RoomCall::Info { room: ROOM, include_songs: true },
            RoomCall::Info { room: ROOM, include_songs: false },
        ]
    );
}

#[tokio::test]
async fn test_room_scoped_commands_reach_the_room() {
    let (ctx, mut client) = seated().await;

    client.send(Packet::empty(CommandType::SetSelectedSong)).await;
    client
        .send(Packet::new(CommandType::SetSelectedSong, song(90.0).encode()))
        .await;
    client
        .send(Packet::new(CommandType::PlayerReady, vec![0u8]))
        .await;
    client
        .send(Packet::new(CommandType::PlayerReady, vec![7u8]))
        .await;
    client
        .send(Packet::new(
            CommandType::TransferHost,
            player("bob", 2).encode(),
        ))
        .await;
    client.send(Packet::empty(CommandType::DestroyRoom)).await;
    client.barrier().await;

    let calls: Vec<_> = ctx
        .registry
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, RoomCall::Join { .. }))
        .collect();
    assert_eq!(
        calls,
        vec![
            RoomCall::SetSelectedSong { room: ROOM, song: None },
            RoomCall::SetSelectedSong {
                room: ROOM,
                song: Some(song(90.0))
            },
            RoomCall::SetReady { room: ROOM, player: 1, ready: false },
            RoomCall::SetReady { room: ROOM, player: 1, ready: true },
            RoomCall::TransferHost { room: ROOM, from: 1, to: 2 },
            RoomCall::Destroy { room: ROOM, player: 1 },
        ]
    );
}

#[tokio::test]
async fn test_update_player_info_replaces_identity() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;

    let renamed = PlayerInfo {
        name: "alice_v2".into(),
        id: 1,
        extra: Bytes::from_static(b"avatar"),
    };
    client
        .send(Packet::new(CommandType::UpdatePlayerInfo, renamed.encode()))
        .await;
    client.barrier().await;

    assert_eq!(ctx.session(1).identity(), renamed);
}

#[tokio::test]
async fn test_malformed_payloads_are_dropped_without_closing() {
    let (ctx, mut client) = seated().await;

    client
        .send(Packet::new(CommandType::StartLevel, vec![2u8]))
        .await;
    client
        .send(Packet::new(CommandType::UpdatePlayerInfo, vec![1u8, 2]))
        .await;
    client
        .send(Packet::new(CommandType::JoinRoom, vec![1u8]))
        .await;
    client.send(Packet::empty(CommandType::PlayerReady)).await;
    client.barrier().await;

    assert_eq!(ctx.session(1).name(), "alice");
    assert!(
        !ctx.registry
            .calls()
            .iter()
            .any(|c| matches!(c, RoomCall::StartLevel { .. } | RoomCall::SetReady { .. }))
    );
}

#[tokio::test]
async fn test_unknown_tags_are_ignored() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;

    client
        .send(Packet {
            tag: 200,
            payload: Bytes::from_static(b"from the future"),
        })
        .await;
    client.barrier().await;
    assert_eq!(ctx.state.clients.len(), 1);
}

#[tokio::test]
async fn test_connect_keepalive_keeps_the_connection() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;

    client
        .send(Packet::new(CommandType::Connect, vec![0u8, 1]))
        .await;
    client.barrier().await;
    assert_eq!(ctx.state.clients.len(), 1);
}

#[tokio::test]
async fn test_all_zero_connect_is_an_implicit_disconnect() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;

    client
        .send(Packet::new(CommandType::Connect, vec![0u8; 4]))
        .await;
    client.expect_closed().await;
    client.finished().await;
    assert!(ctx.state.clients.is_empty());
}

#[tokio::test]
async fn test_disconnect_command_closes_the_connection() {
    let mut ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;

    client.send(Packet::empty(CommandType::Disconnect)).await;
    client.expect_closed().await;

    match ctx.next_event().await {
        HubEvent::ClientDisconnected { session, room_id } => {
            assert_eq!(session.identity().id, 1);
            assert_eq!(room_id, 0);
        }
        other => panic!("unexpected event {other:?}"),
    }
}
