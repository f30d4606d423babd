use serde::{Deserialize, Serialize};

use crate::{
    domain::{CollectionState, Point, PointList},
    error::ApiError,
};

/// Requests a client sends to its point session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientRequest {
    StartAdding,
    AddPoint { lat: f64, lng: f64 },
    ClearPoints,
}

impl ClientRequest {
    pub fn add_point(point: Point) -> Self {
        Self::AddPoint {
            lat: point.lat,
            lng: point.lng,
        }
    }
}

/// State-change notifications published by a point session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    CollectionStarted,
    PointAdded { points: PointList },
    CollectionComplete { points: PointList },
    PointsCleared,
    Error(ApiError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsSnapshot {
    pub points: PointList,
    pub adding_points: bool,
    pub state: CollectionState,
}

impl PointsSnapshot {
    pub fn new(points: PointList, adding_points: bool) -> Self {
        let state = CollectionState::derive(adding_points, points.len());
        Self {
            points,
            adding_points,
            state,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActionRequest {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPointRequest {
    pub user_id: i64,
    pub lat: f64,
    pub lng: f64,
}
