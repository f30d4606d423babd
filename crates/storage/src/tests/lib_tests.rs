use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn create_user_is_idempotent_per_username() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage.create_user("alice").await.expect("user");
    let second = storage.create_user("alice").await.expect("user");
    assert_eq!(first, second);
    assert_eq!(
        storage.username_for_user(first).await.expect("lookup"),
        Some("alice".to_string())
    );
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn lists_locations_oldest_first_with_limit() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let user = storage.create_user("bob").await.expect("user");
    for i in 1..=4 {
        storage
            .create_location(user, Point::new(i as f64, i as f64 * 2.0))
            .await
            .expect("location");
    }

    let rows = storage
        .list_recent_locations(user, 3)
        .await
        .expect("locations");
    let points: Vec<Point> = rows.iter().map(StoredLocation::point).collect();
    assert_eq!(
        points,
        vec![
            Point::new(1.0, 2.0),
            Point::new(2.0, 4.0),
            Point::new(3.0, 6.0)
        ]
    );
    assert!(rows.iter().all(|row| row.owner_id == user));
    assert!(rows.windows(2).all(|pair| pair[0].created_at <= pair[1].created_at));
}

#[tokio::test]
async fn delete_all_locations_only_touches_owner() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = storage.create_user("alice").await.expect("user");
    let bob = storage.create_user("bob").await.expect("user");
    storage
        .create_location(alice, Point::new(1.0, 1.0))
        .await
        .expect("location");
    storage
        .create_location(alice, Point::new(2.0, 2.0))
        .await
        .expect("location");
    storage
        .create_location(bob, Point::new(3.0, 3.0))
        .await
        .expect("location");

    let removed = storage.delete_all_locations(alice).await.expect("delete");
    assert_eq!(removed, 2);
    assert_eq!(storage.count_locations(alice).await.expect("count"), 0);
    assert_eq!(storage.count_locations(bob).await.expect("count"), 1);
}

#[tokio::test]
async fn locations_survive_reopening_file_database() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("points.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let user = {
        let storage = Storage::new(&database_url).await.expect("db");
        let user = storage.create_user("carol").await.expect("user");
        storage
            .create_location(user, Point::new(-6.2, 106.816666))
            .await
            .expect("location");
        storage.pool().close().await;
        user
    };

    let storage = Storage::new(&database_url).await.expect("reopen");
    let rows = storage
        .list_recent_locations(user, 3)
        .await
        .expect("locations");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].point(), Point::new(-6.2, 106.816666));
}
