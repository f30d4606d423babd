//! Authoritative point state for one user session.

use std::sync::Arc;

use shared::{
    domain::{Point, PointList, UserId, MAX_POINTS},
    error::{ApiError, ErrorCode},
    protocol::{ClientRequest, PointsSnapshot, ServerEvent},
};
use storage::LocationStore;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::internal;

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// Not collecting, or the triangle is already complete.
    Ignored,
    Added { points: PointList },
    Completed { points: PointList },
}

impl AddOutcome {
    pub fn was_applied(&self) -> bool {
        !matches!(self, AddOutcome::Ignored)
    }
}

pub struct PointSession {
    owner: UserId,
    points: PointList,
    adding_points: bool,
    store: Arc<dyn LocationStore>,
    events: broadcast::Sender<ServerEvent>,
}

impl PointSession {
    /// Opens a session for `owner` and loads the saved points.
    pub async fn initialize(
        owner: UserId,
        store: Arc<dyn LocationStore>,
        events: broadcast::Sender<ServerEvent>,
    ) -> Result<Self, ApiError> {
        let mut session = Self {
            owner,
            points: PointList::new(),
            adding_points: false,
            store,
            events,
        };
        session.reload().await?;
        Ok(session)
    }

    pub async fn reload(&mut self) -> Result<(), ApiError> {
        let rows = self
            .store
            .list_recent_locations(self.owner, MAX_POINTS as u32)
            .await
            .map_err(|err| self.persistence_failure("load", err))?;
        self.points = rows.iter().map(|row| row.point()).collect();
        self.adding_points = false;
        info!(
            user_id = self.owner.0,
            points = self.points.len(),
            "points: session initialized"
        );
        Ok(())
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn points(&self) -> &PointList {
        &self.points
    }

    pub fn adding_points(&self) -> bool {
        self.adding_points
    }

    pub fn snapshot(&self) -> PointsSnapshot {
        PointsSnapshot::new(self.points.clone(), self.adding_points)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub async fn start_collecting(&mut self) -> Result<Vec<ServerEvent>, ApiError> {
        self.store
            .delete_all_locations(self.owner)
            .await
            .map_err(|err| self.persistence_failure("start collecting", err))?;
        self.points.clear();
        self.adding_points = true;
        info!(user_id = self.owner.0, "points: collection started");
        Ok(self.publish(vec![ServerEvent::CollectionStarted]))
    }

    pub async fn add_point(&mut self, point: Point) -> Result<AddOutcome, ApiError> {
        if !point.is_valid() {
            return Err(ApiError::new(
                ErrorCode::Validation,
                format!("coordinates out of range: {point}"),
            ));
        }
        if !self.adding_points || self.points.is_full() {
            debug!(
                user_id = self.owner.0,
                adding_points = self.adding_points,
                points = self.points.len(),
                "points: add ignored"
            );
            return Ok(AddOutcome::Ignored);
        }

        self.store
            .create_location(self.owner, point)
            .await
            .map_err(|err| self.persistence_failure("add point", err))?;
        self.points.try_push(point);
        info!(
            user_id = self.owner.0,
            %point,
            points = self.points.len(),
            "points: point added"
        );

        let points = self.points.clone();
        let mut events = vec![ServerEvent::PointAdded {
            points: points.clone(),
        }];
        if !self.points.is_full() {
            self.publish(events);
            return Ok(AddOutcome::Added { points });
        }

        self.adding_points = false;
        info!(user_id = self.owner.0, "points: triangle complete");
        events.push(ServerEvent::CollectionComplete {
            points: points.clone(),
        });
        self.publish(events);
        Ok(AddOutcome::Completed { points })
    }

    pub async fn clear_points(&mut self) -> Result<Vec<ServerEvent>, ApiError> {
        self.store
            .delete_all_locations(self.owner)
            .await
            .map_err(|err| self.persistence_failure("clear points", err))?;
        self.points.clear();
        self.adding_points = false;
        info!(user_id = self.owner.0, "points: cleared");
        Ok(self.publish(vec![ServerEvent::PointsCleared]))
    }

    /// Applies a client request and returns the events it produced.
    pub async fn handle(&mut self, request: ClientRequest) -> Result<Vec<ServerEvent>, ApiError> {
        match request {
            ClientRequest::StartAdding => self.start_collecting().await,
            ClientRequest::ClearPoints => self.clear_points().await,
            ClientRequest::AddPoint { lat, lng } => {
                let outcome = self.add_point(Point::new(lat, lng)).await?;
                Ok(match outcome {
                    AddOutcome::Ignored => Vec::new(),
                    AddOutcome::Added { points } => vec![ServerEvent::PointAdded { points }],
                    AddOutcome::Completed { points } => vec![
                        ServerEvent::PointAdded {
                            points: points.clone(),
                        },
                        ServerEvent::CollectionComplete { points },
                    ],
                })
            }
        }
    }

    fn publish(&self, events: Vec<ServerEvent>) -> Vec<ServerEvent> {
        for event in &events {
            let _ = self.events.send(event.clone());
        }
        events
    }

    fn persistence_failure(&self, action: &str, err: anyhow::Error) -> ApiError {
        error!(user_id = self.owner.0, %action, error = %err, "points: persistence failed");
        internal(err)
    }
}
