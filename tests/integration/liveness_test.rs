// tests/integration/liveness_test.rs

use super::test_helpers::*;
use serverhub::core::protocol::{CommandType, Packet};
use serverhub::core::tasks::liveness::LivenessMonitor;
use std::time::Duration;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_millis(45_000);

#[tokio::test]
async fn test_idle_player_in_a_room_is_kicked() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;
    ctx.session(1).enter_room(3);

    let monitor = LivenessMonitor::new(ctx.state.clone());
    let t0 = Instant::now();
    monitor.sweep(t0);
    monitor.sweep(t0 + TIMEOUT);
    client.barrier().await;
    assert_eq!(ctx.state.clients.len(), 1, "exactly 45s is not yet idle");

    monitor.sweep(t0 + TIMEOUT + Duration::from_millis(1));
    assert_eq!(client.recv().await, Packet::empty(CommandType::Disconnect));
    client.expect_closed().await;
    client.finished().await;

    assert!(ctx.state.clients.is_empty());
    assert_eq!(ctx.state.stats.connected_clients(), 0);
}

#[tokio::test]
async fn test_idle_player_in_a_game_is_kicked() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;
    let session = ctx.session(1);
    session.enter_room(3);
    assert!(session.enter_game(3));

    let monitor = LivenessMonitor::new(ctx.state.clone());
    let t0 = Instant::now();
    monitor.sweep(t0);
    monitor.sweep(t0 + Duration::from_secs(46));
    assert_eq!(client.recv().await.command(), Some(CommandType::Disconnect));
    client.expect_closed().await;
}

#[tokio::test]
async fn test_lobby_idling_never_times_out() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;

    let monitor = LivenessMonitor::new(ctx.state.clone());
    let t0 = Instant::now();
    for minutes in 0..10 {
        monitor.sweep(t0 + Duration::from_secs(60 * minutes));
    }
    client.barrier().await;
    assert_eq!(ctx.state.clients.len(), 1);
}

#[tokio::test]
async fn test_returning_to_the_lobby_resets_the_stopwatch() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;
    let session = ctx.session(1);

    let monitor = LivenessMonitor::new(ctx.state.clone());
    let t0 = Instant::now();
    session.enter_room(3);
    monitor.sweep(t0);

    session.return_to_lobby();
    monitor.sweep(t0 + Duration::from_secs(30));

    session.enter_room(3);
    monitor.sweep(t0 + Duration::from_secs(40));
    monitor.sweep(t0 + Duration::from_secs(80));

    client.barrier().await;
    assert_eq!(ctx.state.clients.len(), 1);
}

#[tokio::test]
async fn test_kick_is_delivered_once() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(&player("alice", 1)).await;
    ctx.session(1).enter_room(3);

    let monitor = LivenessMonitor::new(ctx.state.clone());
    let t0 = Instant::now();
    monitor.sweep(t0);
    let late = t0 + Duration::from_secs(50);
    monitor.sweep(late);
    monitor.sweep(late);

    assert_eq!(client.recv().await.command(), Some(CommandType::Disconnect));
    client.expect_closed().await;
    assert_eq!(ctx.state.stats.get_kicked_clients(), 1);
}

#[tokio::test]
async fn test_monitor_task_stops_on_shutdown() {
    let mut config = TestContext::default_config();
    config.liveness_tick = Duration::from_millis(5);
    let ctx = TestContext::with_config(config);

    let monitor = LivenessMonitor::new(ctx.state.clone());
    let handle = tokio::spawn(monitor.run(ctx.shutdown_tx.subscribe()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    ctx.shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
}
