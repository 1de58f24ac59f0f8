mod time;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use time::{ClockTime, StopTime};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(pub String);

impl StopId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StopId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub String);

impl TripId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TripId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How the traveller gets from the previous stop to this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Walk,
    Metro,
    Bus,
    Taxi,
    Car,
    /// First stop of a round trip; no travel leg precedes it.
    Start,
}

impl Transport {
    pub const ALL: [Transport; 6] = [
        Self::Walk,
        Self::Metro,
        Self::Bus,
        Self::Taxi,
        Self::Car,
        Self::Start,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walk => "walk",
            Self::Metro => "metro",
            Self::Bus => "bus",
            Self::Taxi => "taxi",
            Self::Car => "car",
            Self::Start => "start",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Activity,
    Landmark,
    Restaurant,
    Lodging,
    Shop,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Activity,
        Self::Landmark,
        Self::Restaurant,
        Self::Lodging,
        Self::Shop,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Landmark => "landmark",
            Self::Restaurant => "restaurant",
            Self::Lodging => "lodging",
            Self::Shop => "shop",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
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

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lng)
    }
}

/// Where the traveller sleeps; round trips start and end here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lodging {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Lodging {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// One stop of a day plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryItem {
    pub id: StopId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub time: StopTime,
    pub lat: f64,
    pub lng: f64,
    pub transport: Transport,
    pub category: Category,
    /// Duration of the leg from the previous stop, or "N/A".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ItineraryItem {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// Everything but the id.
    pub fn draft(&self) -> StopDraft {
        StopDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            time: self.time.clone(),
            lat: self.lat,
            lng: self.lng,
            transport: self.transport,
            category: self.category,
            travel_time: self.travel_time.clone(),
            image_url: self.image_url.clone(),
        }
    }

    /// Overwrites every field except `id`.
    pub fn replace_content(&mut self, draft: StopDraft) {
        let id = std::mem::replace(&mut self.id, StopId(String::new()));
        *self = draft.into_item(id);
    }
}

/// A stop that has not been given an id yet, as produced by the generation
/// gateway or the manual add flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub time: StopTime,
    pub lat: f64,
    pub lng: f64,
    pub transport: Transport,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl StopDraft {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    pub fn into_item(self, id: StopId) -> ItineraryItem {
        ItineraryItem {
            id,
            name: self.name,
            description: self.description,
            time: self.time,
            lat: self.lat,
            lng: self.lng,
            transport: self.transport,
            category: self.category,
            travel_time: self.travel_time,
            image_url: self.image_url,
        }
    }
}

/// A stop entered by hand; transport and travel time are filled in from a
/// travel estimate when it is inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualStop {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub time: String,
    pub lat: f64,
    pub lng: f64,
    pub category: Category,
}

impl ManualStop {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// A named, persisted itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    pub id: TripId,
    pub name: String,
    pub city: String,
    pub itinerary: Vec<ItineraryItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PlaceDetails {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelEstimate {
    pub transport: Transport,
    pub travel_time: String,
}

impl Default for TravelEstimate {
    fn default() -> Self {
        Self {
            transport: Transport::Walk,
            travel_time: "N/A".to_string(),
        }
    }
}

/// Geographic bounds as `[lat_min, lat_max, lon_min, lon_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: Coordinates) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.lat)
            && (self.lon_min..=self.lon_max).contains(&point.lng)
    }
}

/// One hit from the location search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCandidate {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl LocationCandidate {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// "Lisbon, Portugal" -> "Lisbon".
    pub fn city_name(&self) -> &str {
        self.name.split(',').next().unwrap_or_default().trim()
    }

    pub fn to_lodging(&self) -> Lodging {
        Lodging {
            name: self.name.clone(),
            lat: self.lat,
            lng: self.lng,
        }
    }
}
