// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::{LogSource, WebSocketEventKind};

fn log(id: u64, level: LogLevel, test_id: Option<&str>, tab_id: u64) -> LogEntry {
    LogEntry {
        id,
        ts: 1_000 + id,
        level,
        source: LogSource::Console,
        message: "hello".to_owned(),
        args: None,
        stack: None,
        url: "http://x".to_owned(),
        tab_id,
        test_id: test_id.map(str::to_owned),
        session_id: "s1".to_owned(),
    }
}

fn ws_event(id: u64, connection_id: &str, kind: WebSocketEventKind) -> WebSocketEvent {
    WebSocketEvent {
        id,
        ts: 1_000 + id,
        connection_id: connection_id.to_owned(),
        event: kind,
        direction: None,
        data: None,
        size: None,
        code: None,
        reason: None,
        url: "ws://x".to_owned(),
        tab_id: 1,
        test_id: None,
        session_id: "s1".to_owned(),
    }
}

#[tokio::test]
async fn log_stream_push_assigns_matching_id_and_indexes() {
    let stream = LogStream::new(10);
    let id = stream.push_with(|id| log(id, LogLevel::Error, Some("t1"), 7)).await;

    let stats = stream.stats().await;
    assert_eq!(stats.size, 1);

    let by_test = stream.ids_for_test("t1").await;
    assert_eq!(by_test, vec![id]);

    let by_level = stream.ids_for_level(LogLevel::Error).await;
    assert_eq!(by_level, vec![id]);
}

#[tokio::test]
async fn log_stream_eviction_updates_stats_dropped() {
    let stream = LogStream::new(2);
    stream.push_with(|id| log(id, LogLevel::Info, None, 1)).await;
    stream.push_with(|id| log(id, LogLevel::Info, None, 1)).await;
    stream.push_with(|id| log(id, LogLevel::Info, None, 1)).await;

    let stats = stream.stats().await;
    assert_eq!(stats.size, 2);
    assert_eq!(stats.dropped, 1);
}

#[tokio::test]
async fn ws_stream_rejects_events_after_close() {
    let stream = WsStream::new(10);
    let ok1 = stream.push_with("conn-1", |id| ws_event(id, "conn-1", WebSocketEventKind::Open)).await;
    assert!(ok1.is_ok());
    let ok2 =
        stream.push_with("conn-1", |id| ws_event(id, "conn-1", WebSocketEventKind::Close)).await;
    assert!(ok2.is_ok());

    let rejected =
        stream.push_with("conn-1", |id| ws_event(id, "conn-1", WebSocketEventKind::Message)).await;
    assert!(rejected.is_err());

    let stats = stream.stats().await;
    assert_eq!(stats.size, 2, "rejected event must not be stored");
}

#[tokio::test]
async fn ws_stream_other_connections_unaffected_by_close() {
    let stream = WsStream::new(10);
    stream.push_with("conn-1", |id| ws_event(id, "conn-1", WebSocketEventKind::Close)).await.unwrap();
    let ok = stream.push_with("conn-2", |id| ws_event(id, "conn-2", WebSocketEventKind::Open)).await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn stores_clear_resets_every_stream() {
    let config = GasolineConfig::default();
    let stores = Stores::new(&config);
    stores.logs.push_with(|id| log(id, LogLevel::Error, Some("t1"), 1)).await;
    stores.tabs.write().await.insert(
        1,
        TabRecord {
            tab_id: 1,
            url: "http://x".to_owned(),
            title: None,
            tracked: true,
            last_seen_ts: 1,
            restricted: false,
        },
    );

    stores.clear(&config).await;

    assert_eq!(stores.logs.stats().await.size, 0);
    assert!(stores.tabs.read().await.is_empty());
}

#[tokio::test]
async fn stores_clear_logs_leaves_other_streams_intact() {
    let config = GasolineConfig::default();
    let stores = Stores::new(&config);
    stores.logs.push_with(|id| log(id, LogLevel::Error, None, 1)).await;
    stores
        .actions
        .push_with(|id| Action {
            id,
            ts: 1,
            kind: crate::model::ActionKind::Click,
            selectors: None,
            url: None,
            to_url: None,
            tab_id: 1,
            test_id: None,
            session_id: "s1".to_owned(),
        })
        .await;

    stores.clear_logs(&config).await;

    assert_eq!(stores.logs.stats().await.size, 0);
    assert_eq!(stores.actions.stats().await.size, 1);
}
