use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(LocationId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Number of points that close the triangle.
pub const MAX_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Selected points in selection order. Never holds more than [`MAX_POINTS`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PointList(Vec<Point>);

impl PointList {
    pub fn new() -> Self {
        Self(Vec::with_capacity(MAX_POINTS))
    }

    /// Appends `point` unless the list is already full.
    pub fn try_push(&mut self, point: Point) -> bool {
        if self.is_full() {
            return false;
        }
        self.0.push(point);
        true
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.0.len() >= MAX_POINTS
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.0.iter()
    }

    /// The closed triangle, present only once all three points are selected.
    pub fn triangle(&self) -> Option<[Point; MAX_POINTS]> {
        match self.0.as_slice() {
            [a, b, c] => Some([*a, *b, *c]),
            _ => None,
        }
    }
}

impl FromIterator<Point> for PointList {
    /// Keeps the first [`MAX_POINTS`] points and drops the rest.
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().take(MAX_POINTS).collect())
    }
}

impl TryFrom<Vec<Point>> for PointList {
    type Error = String;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        if points.len() > MAX_POINTS {
            return Err(format!(
                "point list holds at most {MAX_POINTS} points, got {}",
                points.len()
            ));
        }
        Ok(Self(points))
    }
}

impl<'de> Deserialize<'de> for PointList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let points = Vec::<Point>::deserialize(deserializer)?;
        PointList::try_from(points).map_err(serde::de::Error::custom)
    }
}

impl<'a> IntoIterator for &'a PointList {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    Idle,
    Collecting,
    Complete,
}

impl CollectionState {
    pub fn derive(adding_points: bool, point_count: usize) -> Self {
        if point_count >= MAX_POINTS {
            Self::Complete
        } else if adding_points {
            Self::Collecting
        } else {
            Self::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_list_refuses_fourth_point() {
        let mut points = PointList::new();
        for i in 0..3 {
            assert!(points.try_push(Point::new(i as f64, i as f64)));
        }
        assert!(!points.try_push(Point::new(9.0, 9.0)));
        assert_eq!(points.len(), 3);
        assert!(points.triangle().is_some());
    }

    #[test]
    fn point_list_rejects_oversized_payload() {
        let raw = r#"[{"lat":1,"lng":1},{"lat":2,"lng":2},{"lat":3,"lng":3},{"lat":4,"lng":4}]"#;
        assert!(serde_json::from_str::<PointList>(raw).is_err());
    }

    #[test]
    fn collection_state_is_derived_from_flag_and_length() {
        assert_eq!(CollectionState::derive(false, 0), CollectionState::Idle);
        assert_eq!(CollectionState::derive(true, 2), CollectionState::Collecting);
        assert_eq!(CollectionState::derive(false, 3), CollectionState::Complete);
        assert_eq!(CollectionState::derive(false, 2), CollectionState::Idle);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Point::new(-6.2, 106.816666).is_valid());
        assert!(!Point::new(91.0, 0.0).is_valid());
        assert!(!Point::new(0.0, f64::NAN).is_valid());
    }
}
