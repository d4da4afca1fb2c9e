use std::fmt;

use serde::Serialize;

use crate::domain::LoadWarning;
use crate::error::LoaderError;

pub const LATITUDE_PURLS: [&str; 3] = [
    "http://purl.obolibrary.org/obo/OBI_0001620",
    "http://purl.obolibrary.org/obo/PMO_00000076",
    "http://purl.obolibrary.org/obo/PMO_00000079",
];

pub const LONGITUDE_PURLS: [&str; 3] = [
    "http://purl.obolibrary.org/obo/OBI_0001621",
    "http://purl.obolibrary.org/obo/PMO_00000077",
    "http://purl.obolibrary.org/obo/PMO_00000078",
];

pub const DEFAULT_COORDINATE_TOLERANCE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => write!(f, "latitude"),
            Axis::Longitude => write!(f, "longitude"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoordinateRole {
    Point,
    Start,
    End,
}

impl CoordinateRole {
    pub const ALL: [CoordinateRole; 3] =
        [CoordinateRole::Point, CoordinateRole::Start, CoordinateRole::End];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CoordinateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateRole::Point => write!(f, "point"),
            CoordinateRole::Start => write!(f, "start"),
            CoordinateRole::End => write!(f, "end"),
        }
    }
}

pub fn coordinate_of(semantic_type: &str) -> Option<(Axis, CoordinateRole)> {
    let role = |pos: usize| CoordinateRole::ALL[pos];
    if let Some(pos) = LATITUDE_PURLS.iter().position(|purl| *purl == semantic_type) {
        return Some((Axis::Latitude, role(pos)));
    }
    LONGITUDE_PURLS
        .iter()
        .position(|purl| *purl == semantic_type)
        .map(|pos| (Axis::Longitude, role(pos)))
}

pub fn valid_latitude(value: f64) -> bool {
    (-90.0..=90.0).contains(&value)
}

pub fn valid_longitude(value: f64) -> bool {
    (-180.0..=180.0).contains(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoLocation {
    pub points: Vec<GeoPoint>,
}

impl GeoLocation {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// `MULTIPOINT` well-known text in longitude/latitude order, or `None`
    /// for an empty location.
    pub fn to_wkt(&self) -> Option<String> {
        if self.points.is_empty() {
            return None;
        }
        let points = self
            .points
            .iter()
            .map(|point| format!("({} {})", point.longitude, point.latitude))
            .collect::<Vec<_>>();
        Some(format!("MULTIPOINT({})", points.join(",")))
    }
}

pub fn coordinate_spread(values: &[f64]) -> f64 {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.is_empty() { 0.0 } else { max - min }
}

pub fn aggregate(
    entity_id: &str,
    latitudes: &[f64],
    longitudes: &[f64],
    tolerance: f64,
) -> Result<(GeoLocation, Vec<LoadWarning>), LoaderError> {
    if latitudes.len() != longitudes.len() {
        return Err(LoaderError::CoordinateCountMismatch {
            entity_id: entity_id.to_string(),
            latitudes: latitudes.len(),
            longitudes: longitudes.len(),
        });
    }

    if let Some(&value) = latitudes.iter().find(|&&lat| !valid_latitude(lat)) {
        return Err(LoaderError::InvalidLatitude {
            entity_id: entity_id.to_string(),
            value,
        });
    }
    if let Some(&value) = longitudes.iter().find(|&&lng| !valid_longitude(lng)) {
        return Err(LoaderError::InvalidLongitude {
            entity_id: entity_id.to_string(),
            value,
        });
    }

    let mut warnings = Vec::new();
    for (axis, values) in [(Axis::Longitude, longitudes), (Axis::Latitude, latitudes)] {
        let spread = coordinate_spread(values);
        if spread > tolerance {
            let warning = LoadWarning::CoordinateSpread {
                entity_id: entity_id.to_string(),
                axis: axis.to_string(),
                values: values.to_vec(),
                spread,
            };
            warning.emit();
            warnings.push(warning);
        }
    }

    let points = longitudes
        .iter()
        .zip(latitudes)
        .map(|(&longitude, &latitude)| GeoPoint {
            longitude,
            latitude,
        })
        .collect();
    Ok((GeoLocation { points }, warnings))
}
