use daytrip_schema::{StopId, TripId};

/// Everything a planner action can fail with. Every variant is meant to be
/// shown to the user and dismissed; none of them ends the session.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("please enter a city name")]
    EmptyCity,
    #[error("cannot save a trip without a name")]
    EmptyTripName,
    #[error("the itinerary is empty; create or load a trip first")]
    EmptyItinerary,
    #[error("a stop needs a name")]
    MissingName,
    #[error("a stop needs a time")]
    MissingTime,
    #[error("invalid coordinates: {lat}, {lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
    #[error("stop not found: {0}")]
    StopNotFound(StopId),
    #[error("stop {0} starts or ends the round trip and cannot be changed")]
    AnchorStopProtected(StopId),
    #[error("stop {0} is waiting for a suggested alternative")]
    ReplacementPending(StopId),
    #[error("could not determine the previous location to estimate travel time")]
    NoReferenceStop,
    #[error("trip not found: {0}")]
    TripNotFound(TripId),
    #[error("no city is set for the current trip")]
    NoActiveCity,
    #[error("{0:#}")]
    Gateway(anyhow::Error),
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl PlannerError {
    /// Input problems caught before any external call is attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyCity
                | Self::EmptyTripName
                | Self::EmptyItinerary
                | Self::MissingName
                | Self::MissingTime
                | Self::InvalidCoordinates { .. }
        )
    }

    /// Gateway failures the provider flagged as transient (rate limits,
    /// 5xx, timeouts). Nothing retries them automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(err) if daytrip_provider::is_retryable(err))
    }
}

pub type PlannerResult<T> = std::result::Result<T, PlannerError>;
