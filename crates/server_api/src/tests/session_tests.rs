use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{CollectionState, Point, PointList, UserId},
    error::ErrorCode,
    protocol::{ClientRequest, ServerEvent},
};
use storage::{LocationStore, Storage, StoredLocation};
use tokio::sync::broadcast;

use crate::{AddOutcome, PointSession, SessionRegistry};

async fn setup() -> (Arc<Storage>, UserId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let user = storage.create_user("alice").await.expect("user");
    (Arc::new(storage), user)
}

async fn open_session(
    storage: Arc<Storage>,
    user: UserId,
) -> (PointSession, broadcast::Receiver<ServerEvent>) {
    let (events, rx) = broadcast::channel(32);
    let session = PointSession::initialize(user, storage, events)
        .await
        .expect("session");
    (session, rx)
}

fn drain(rx: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn list(points: &[(f64, f64)]) -> PointList {
    points
        .iter()
        .map(|(lat, lng)| Point::new(*lat, *lng))
        .collect()
}

/// Store whose writes can be switched to fail.
struct FlakyStore {
    inner: Storage,
    failing: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(anyhow!("disk I/O error"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocationStore for FlakyStore {
    async fn create_location(&self, owner: UserId, point: Point) -> Result<StoredLocation> {
        self.check()?;
        self.inner.create_location(owner, point).await
    }

    async fn delete_all_locations(&self, owner: UserId) -> Result<u64> {
        self.check()?;
        self.inner.delete_all_locations(owner).await
    }

    async fn list_recent_locations(
        &self,
        owner: UserId,
        limit: u32,
    ) -> Result<Vec<StoredLocation>> {
        self.check()?;
        self.inner.list_recent_locations(owner, limit).await
    }
}

#[tokio::test]
async fn add_is_ignored_until_collection_starts() {
    let (storage, user) = setup().await;
    let (mut session, mut rx) = open_session(Arc::clone(&storage), user).await;

    for i in 0..5 {
        let outcome = session
            .add_point(Point::new(i as f64, i as f64))
            .await
            .expect("add");
        assert_eq!(outcome, AddOutcome::Ignored);
    }

    assert!(session.points().is_empty());
    assert!(drain(&mut rx).is_empty());
    assert_eq!(storage.count_locations(user).await.expect("count"), 0);
}

#[tokio::test]
async fn third_point_completes_triangle_and_stops_collecting() {
    let (storage, user) = setup().await;
    let (mut session, mut rx) = open_session(storage, user).await;

    session.start_collecting().await.expect("start");
    assert_eq!(drain(&mut rx), vec![ServerEvent::CollectionStarted]);

    session.add_point(Point::new(1.0, 1.0)).await.expect("add");
    session.add_point(Point::new(2.0, 2.0)).await.expect("add");
    assert_eq!(session.snapshot().state, CollectionState::Collecting);
    drain(&mut rx);

    let outcome = session.add_point(Point::new(3.0, 3.0)).await.expect("add");
    let expected = list(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
    assert_eq!(
        outcome,
        AddOutcome::Completed {
            points: expected.clone()
        }
    );
    assert!(!session.adding_points());
    assert_eq!(session.snapshot().state, CollectionState::Complete);
    assert_eq!(
        drain(&mut rx),
        vec![
            ServerEvent::PointAdded {
                points: expected.clone()
            },
            ServerEvent::CollectionComplete { points: expected },
        ]
    );
}

#[tokio::test]
async fn fourth_point_is_ignored() {
    let (storage, user) = setup().await;
    let (mut session, mut rx) = open_session(Arc::clone(&storage), user).await;

    session.start_collecting().await.expect("start");
    for i in 1..=3 {
        session
            .add_point(Point::new(i as f64, i as f64))
            .await
            .expect("add");
    }
    drain(&mut rx);

    let outcome = session.add_point(Point::new(4.0, 4.0)).await.expect("add");
    assert_eq!(outcome, AddOutcome::Ignored);
    assert_eq!(session.points().len(), 3);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(storage.count_locations(user).await.expect("count"), 3);
}

#[tokio::test]
async fn duplicate_points_are_kept() {
    let (storage, user) = setup().await;
    let (mut session, _rx) = open_session(storage, user).await;

    session.start_collecting().await.expect("start");
    session.add_point(Point::new(1.0, 1.0)).await.expect("add");
    session.add_point(Point::new(1.0, 1.0)).await.expect("add");

    assert_eq!(session.points(), &list(&[(1.0, 1.0), (1.0, 1.0)]));
    assert!(session.adding_points());
}

#[tokio::test]
async fn start_and_clear_reset_from_any_state() {
    let (storage, user) = setup().await;
    let (mut session, _rx) = open_session(Arc::clone(&storage), user).await;

    session.start_collecting().await.expect("start");
    session.add_point(Point::new(5.0, 5.0)).await.expect("add");
    session.start_collecting().await.expect("restart");
    assert!(session.points().is_empty());
    assert!(session.adding_points());
    assert_eq!(storage.count_locations(user).await.expect("count"), 0);

    for i in 1..=3 {
        session
            .add_point(Point::new(i as f64, i as f64))
            .await
            .expect("add");
    }
    let events = session.clear_points().await.expect("clear");
    assert_eq!(events, vec![ServerEvent::PointsCleared]);
    assert!(session.points().is_empty());
    assert!(!session.adding_points());
    assert_eq!(session.snapshot().state, CollectionState::Idle);
    assert_eq!(storage.count_locations(user).await.expect("count"), 0);
}

#[tokio::test]
async fn reinitialize_restores_points_in_selection_order() {
    let (storage, user) = setup().await;
    {
        let (mut session, _rx) = open_session(Arc::clone(&storage), user).await;
        session.start_collecting().await.expect("start");
        session.add_point(Point::new(10.0, 20.0)).await.expect("add");
        session.add_point(Point::new(-5.0, 7.5)).await.expect("add");
        session.add_point(Point::new(0.5, 0.25)).await.expect("add");
    }

    let (session, _rx) = open_session(Arc::clone(&storage), user).await;
    assert_eq!(
        session.points(),
        &list(&[(10.0, 20.0), (-5.0, 7.5), (0.5, 0.25)])
    );
    assert!(!session.adding_points());
}

#[tokio::test]
async fn clear_after_complete_reloads_empty() {
    let (storage, user) = setup().await;
    let (mut session, _rx) = open_session(Arc::clone(&storage), user).await;
    session.start_collecting().await.expect("start");
    for i in 1..=3 {
        session
            .add_point(Point::new(i as f64, i as f64))
            .await
            .expect("add");
    }
    session.clear_points().await.expect("clear");

    let (session, _rx) = open_session(storage, user).await;
    assert!(session.points().is_empty());
    assert_eq!(session.snapshot().state, CollectionState::Idle);
}

#[tokio::test]
async fn rejects_invalid_coordinates_without_mutating() {
    let (storage, user) = setup().await;
    let (mut session, mut rx) = open_session(storage, user).await;
    session.start_collecting().await.expect("start");
    drain(&mut rx);

    let err = session
        .add_point(Point::new(120.0, 0.0))
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(session.points().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn persistence_failure_leaves_state_untouched() {
    let (storage, user) = setup().await;
    let store = Arc::new(FlakyStore {
        inner: (*storage).clone(),
        failing: AtomicBool::new(false),
    });
    let (events, mut rx) = broadcast::channel(16);
    let mut session = PointSession::initialize(user, store.clone(), events)
        .await
        .expect("session");
    session.start_collecting().await.expect("start");
    session.add_point(Point::new(1.0, 1.0)).await.expect("add");
    drain(&mut rx);

    store.failing.store(true, Ordering::SeqCst);
    let err = session
        .add_point(Point::new(2.0, 2.0))
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Internal);
    let err = session.clear_points().await.expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Internal);

    assert_eq!(session.points(), &list(&[(1.0, 1.0)]));
    assert!(session.adding_points());
    assert!(drain(&mut rx).is_empty());

    store.failing.store(false, Ordering::SeqCst);
    session.add_point(Point::new(2.0, 2.0)).await.expect("add");
    assert_eq!(session.points(), &list(&[(1.0, 1.0), (2.0, 2.0)]));
}

#[tokio::test]
async fn handle_maps_requests_to_events() {
    let (storage, user) = setup().await;
    let (mut session, _rx) = open_session(storage, user).await;

    assert!(session
        .handle(ClientRequest::AddPoint { lat: 1.0, lng: 1.0 })
        .await
        .expect("ignored add")
        .is_empty());
    assert_eq!(
        session
            .handle(ClientRequest::StartAdding)
            .await
            .expect("start"),
        vec![ServerEvent::CollectionStarted]
    );
    assert_eq!(
        session
            .handle(ClientRequest::AddPoint { lat: 1.0, lng: 1.0 })
            .await
            .expect("add"),
        vec![ServerEvent::PointAdded {
            points: list(&[(1.0, 1.0)])
        }]
    );
    assert_eq!(
        session
            .handle(ClientRequest::ClearPoints)
            .await
            .expect("clear"),
        vec![ServerEvent::PointsCleared]
    );
}

#[tokio::test]
async fn registry_shares_session_until_last_detach() {
    let (storage, user) = setup().await;
    let registry = SessionRegistry::new(storage, 16);

    let first = registry.attach(user).await.expect("attach");
    let second = registry.attach(user).await.expect("attach");
    assert!(Arc::ptr_eq(&first, &second));
    first.lock().await.start_collecting().await.expect("start");
    assert!(second.lock().await.adding_points());

    registry.detach(user).await;
    assert_eq!(registry.len().await, 1);
    registry.detach(user).await;
    assert!(registry.is_empty().await);
    assert!(registry.get(user).await.is_none());
}
