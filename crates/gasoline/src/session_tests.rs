// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::GasolineConfig;
use crate::store::Stores;

fn stores() -> Stores {
    Stores::new(&GasolineConfig::default())
}

#[tokio::test]
async fn rotate_session_changes_id_and_clears_tracking() {
    let tracker = SessionTracker::new(vec![]);
    let original = tracker.session_id().await;
    tracker.start_test("t1".to_owned()).await;
    tracker.note_action_tab(5).await;

    let rotated = tracker.rotate_session().await;

    assert_ne!(original, rotated);
    assert_eq!(tracker.current_test_id().await, None);
    let stores = stores();
    assert_eq!(tracker.resolve_target(&stores, None).await, Err(TargetError::ResolutionFailed));
}

#[tokio::test]
async fn start_and_end_test_round_trip() {
    let tracker = SessionTracker::new(vec![]);
    assert_eq!(tracker.current_test_id().await, None);
    tracker.start_test("my-test".to_owned()).await;
    assert_eq!(tracker.current_test_id().await, Some("my-test".to_owned()));
    tracker.end_test().await;
    assert_eq!(tracker.current_test_id().await, None);
}

#[test]
fn internal_schemes_are_always_restricted() {
    let tracker = SessionTracker::new(vec![]);
    assert!(tracker.is_restricted("chrome://extensions"));
    assert!(tracker.is_restricted("about:blank"));
    assert!(tracker.is_restricted("edge://settings"));
    assert!(tracker.is_restricted("view-source:https://example.com"));
    assert!(!tracker.is_restricted("https://example.com"));
}

#[test]
fn configured_origins_are_restricted() {
    let tracker = SessionTracker::new(vec!["https://admin.internal".to_owned()]);
    assert!(tracker.is_restricted("https://admin.internal/dashboard"));
    assert!(!tracker.is_restricted("https://example.com"));
}

#[tokio::test]
async fn touch_tab_inserts_and_updates_record() {
    let tracker = SessionTracker::new(vec![]);
    let stores = stores();
    tracker.touch_tab(&stores, 7, Some("https://example.com".to_owned())).await;

    {
        let tabs = stores.tabs.read().await;
        let record = tabs.get(&7).expect("tab recorded");
        assert_eq!(record.url, "https://example.com");
        assert!(record.tracked);
        assert!(!record.restricted);
    }

    tracker.touch_tab(&stores, 7, Some("chrome://extensions".to_owned())).await;
    let tabs = stores.tabs.read().await;
    let record = tabs.get(&7).unwrap();
    assert_eq!(record.url, "chrome://extensions");
    assert!(record.restricted);
}

#[tokio::test]
async fn resolve_target_prefers_explicit_over_tracked_over_active() {
    let tracker = SessionTracker::new(vec![]);
    let stores = stores();
    tracker.touch_tab(&stores, 1, Some("https://one.example".to_owned())).await;
    tracker.touch_tab(&stores, 2, Some("https://two.example".to_owned())).await;
    tracker.touch_tab(&stores, 3, Some("https://three.example".to_owned())).await;

    tracker.set_active_tab(3).await;
    let resolved = tracker.resolve_target(&stores, None).await.unwrap();
    assert_eq!(resolved.tab_id, 3);
    assert_eq!(resolved.source, TargetSource::ActiveTab);

    tracker.note_action_tab(2).await;
    let resolved = tracker.resolve_target(&stores, None).await.unwrap();
    assert_eq!(resolved.tab_id, 2);
    assert_eq!(resolved.source, TargetSource::TrackedTab);

    let resolved = tracker.resolve_target(&stores, Some(1)).await.unwrap();
    assert_eq!(resolved.tab_id, 1);
    assert_eq!(resolved.source, TargetSource::ExplicitTab);
}

#[tokio::test]
async fn resolve_target_fails_with_no_known_tab() {
    let tracker = SessionTracker::new(vec![]);
    let stores = stores();
    assert_eq!(tracker.resolve_target(&stores, None).await, Err(TargetError::ResolutionFailed));
}

#[tokio::test]
async fn resolve_target_zero_is_missing_target() {
    let tracker = SessionTracker::new(vec![]);
    let stores = stores();
    assert_eq!(tracker.resolve_target(&stores, Some(0)).await, Err(TargetError::MissingTarget));
}
