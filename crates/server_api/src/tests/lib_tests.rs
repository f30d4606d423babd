use super::*;
use shared::domain::{CollectionState, Point, PointList};

async fn setup() -> (ApiContext, UserId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ctx = ApiContext::new(storage, 16);
    let user = login(&ctx, "alice").await.expect("login");
    (ctx, user)
}

#[tokio::test]
async fn login_rejects_blank_username() {
    let (ctx, _) = setup().await;
    let err = login(&ctx, "   ").await.expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn unknown_user_cannot_dispatch() {
    let (ctx, _) = setup().await;
    let err = dispatch(&ctx, UserId(9999), ClientRequest::StartAdding)
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn dispatch_full_triangle_scenario() {
    let (ctx, user) = setup().await;
    dispatch(&ctx, user, ClientRequest::StartAdding)
        .await
        .expect("start");
    for (lat, lng) in [(1.0, 1.0), (2.0, 2.0)] {
        dispatch(&ctx, user, ClientRequest::AddPoint { lat, lng })
            .await
            .expect("add");
    }
    let events = dispatch(&ctx, user, ClientRequest::AddPoint { lat: 3.0, lng: 3.0 })
        .await
        .expect("add");

    let triangle: PointList = [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]
        .into_iter()
        .map(|(lat, lng)| Point::new(lat, lng))
        .collect();
    assert_eq!(
        events.last(),
        Some(&ServerEvent::CollectionComplete {
            points: triangle.clone()
        })
    );

    let snapshot = points_snapshot(&ctx, user).await.expect("snapshot");
    assert_eq!(snapshot.points, triangle);
    assert!(!snapshot.adding_points);
    assert_eq!(snapshot.state, CollectionState::Complete);
}

#[tokio::test]
async fn sessions_are_isolated_per_user() {
    let (ctx, alice) = setup().await;
    let bob = login(&ctx, "bob").await.expect("login");

    dispatch(&ctx, alice, ClientRequest::StartAdding)
        .await
        .expect("start");
    dispatch(&ctx, alice, ClientRequest::AddPoint { lat: 4.0, lng: 4.0 })
        .await
        .expect("add");

    let bob_snapshot = points_snapshot(&ctx, bob).await.expect("snapshot");
    assert!(bob_snapshot.points.is_empty());
    assert_eq!(bob_snapshot.state, CollectionState::Idle);
}
