//! Geographic points.

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`GeoPoint`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// Longitude outside `[-180, 180]` or not finite.
    #[error("longitude must be between -180 and 180 (got {0})")]
    InvalidLongitude(f64),
    /// Latitude outside `[-90, 90]` or not finite.
    #[error("latitude must be between -90 and 90 (got {0})")]
    InvalidLatitude(f64),
    /// The GeoJSON `type` member was not `Point`.
    #[error("unsupported geometry type: {0}")]
    UnsupportedType(String),
}

/// A WGS84 point.
///
/// Serializes as a GeoJSON `Point`, with coordinates in `[lng, lat]` order:
///
/// ```
/// use delicious_core::GeoPoint;
///
/// let point = GeoPoint::new(-79.38, 43.65).unwrap();
/// let json = serde_json::to_value(point).unwrap();
/// assert_eq!(json["type"], "Point");
/// assert_eq!(json["coordinates"][0], -79.38);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeoPoint {
    lng: f64,
    lat: f64,
}

impl GeoPoint {
    /// GeoJSON geometry type tag.
    pub const TYPE: &'static str = "Point";

    /// Create a point from longitude and latitude.
    ///
    /// # Errors
    ///
    /// Returns an error if either coordinate is out of range or not finite.
    pub fn new(lng: f64, lat: f64) -> Result<Self, GeoError> {
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::InvalidLongitude(lng));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::InvalidLatitude(lat));
        }
        Ok(Self { lng, lat })
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Coordinates in GeoJSON order (`[lng, lat]`).
    #[must_use]
    pub const fn coordinates(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

#[derive(Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(value: GeoJsonPoint) -> Result<Self, Self::Error> {
        if value.kind != Self::TYPE {
            return Err(GeoError::UnsupportedType(value.kind));
        }
        let [lng, lat] = value.coordinates;
        Self::new(lng, lat)
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(value: GeoPoint) -> Self {
        Self {
            kind: GeoPoint::TYPE.to_owned(),
            coordinates: value.coordinates(),
        }
    }
}
