//! Boundary to the generative planner.
//!
//! [`LlmPlanner`] turns each request into a structured-output prompt, then
//! coerces the model's JSON into schema types. Responses are never trusted
//! as-is: unknown enum values are mapped to safe defaults and malformed stops
//! are dropped or rejected.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use daytrip_provider::{LlmProvider, LlmRequest};
use daytrip_schema::{
    Category, Coordinates, ItineraryItem, Lodging, PlaceDetails, StopDraft, StopTime,
    TravelEstimate, Transport,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[async_trait]
pub trait TravelEstimator: Send + Sync {
    async fn travel_estimate(
        &self,
        from: Coordinates,
        to: Coordinates,
        city: &str,
    ) -> Result<TravelEstimate>;
}

#[async_trait]
pub trait PlannerGateway: TravelEstimator {
    /// An ordered day plan. With lodging, the plan starts and ends there.
    async fn generate_itinerary(
        &self,
        city: &str,
        lodging: Option<&Lodging>,
        excluded: &[String],
    ) -> Result<Vec<StopDraft>>;

    async fn generate_alternative(
        &self,
        city: &str,
        replacing: &ItineraryItem,
        itinerary: &[ItineraryItem],
        excluded: &[String],
    ) -> Result<StopDraft>;

    async fn place_details(&self, place: &str, city: &str) -> Result<PlaceDetails>;
}

pub struct LlmPlanner {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn ask(&self, prompt: String, schema: Value) -> Result<String> {
        let request = LlmRequest::structured(self.model.clone(), prompt, schema);
        let response = self.provider.chat(request).await?;
        debug!(
            input_tokens = ?response.input_tokens,
            output_tokens = ?response.output_tokens,
            "planner response received"
        );
        Ok(response.text)
    }
}

#[async_trait]
impl TravelEstimator for LlmPlanner {
    async fn travel_estimate(
        &self,
        from: Coordinates,
        to: Coordinates,
        city: &str,
    ) -> Result<TravelEstimate> {
        let prompt = format!(
            "In {city}, what is the most sensible way to travel from ({from}) to ({to}), \
             and roughly how long does it take? Choose transport from 'walk', 'metro', \
             'bus', 'taxi' or 'car' and describe the duration like \"approx. 15 mins\"."
        );
        let text = self
            .ask(prompt, travel_schema())
            .await
            .context("failed to estimate travel time")?;
        Ok(parse_travel_estimate(&text))
    }
}

#[async_trait]
impl PlannerGateway for LlmPlanner {
    async fn generate_itinerary(
        &self,
        city: &str,
        lodging: Option<&Lodging>,
        excluded: &[String],
    ) -> Result<Vec<StopDraft>> {
        let prompt = itinerary_prompt(city, lodging, excluded);
        let text = self.ask(prompt, itinerary_schema()).await.context(
            "failed to generate itinerary; the AI service may be unavailable or the city might be invalid",
        )?;
        let stops = parse_itinerary(&text, lodging).context("failed to generate itinerary")?;
        info!(city, stops = stops.len(), excluded = excluded.len(), "generated itinerary");
        Ok(stops)
    }

    async fn generate_alternative(
        &self,
        city: &str,
        replacing: &ItineraryItem,
        itinerary: &[ItineraryItem],
        excluded: &[String],
    ) -> Result<StopDraft> {
        let prompt = alternative_prompt(city, replacing, itinerary, excluded);
        let text = self
            .ask(prompt, alternative_schema())
            .await
            .context("failed to generate an alternative; the AI service may be unavailable")?;
        let draft = parse_alternative(&text).context("failed to generate an alternative")?;
        if draft.name.eq_ignore_ascii_case(&replacing.name) {
            warn!(name = %draft.name, "alternative repeats the replaced stop");
        }
        Ok(draft)
    }

    async fn place_details(&self, place: &str, city: &str) -> Result<PlaceDetails> {
        let prompt = format!(
            "Give the official name, a one-sentence description and the precise latitude \
             and longitude of \"{place}\" in {city}."
        );
        let text = self
            .ask(prompt, place_schema())
            .await
            .with_context(|| format!("failed to get details for {place}"))?;
        parse_place_details(&text, place).with_context(|| format!("failed to get details for {place}"))
    }
}

/// Stands in when no provider is configured; every call fails with `reason`.
pub struct UnavailableGateway {
    reason: String,
}

impl UnavailableGateway {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TravelEstimator for UnavailableGateway {
    async fn travel_estimate(&self, _: Coordinates, _: Coordinates, _: &str) -> Result<TravelEstimate> {
        Err(anyhow!("{}", self.reason))
    }
}

#[async_trait]
impl PlannerGateway for UnavailableGateway {
    async fn generate_itinerary(&self, _: &str, _: Option<&Lodging>, _: &[String]) -> Result<Vec<StopDraft>> {
        Err(anyhow!("{}", self.reason))
    }

    async fn generate_alternative(
        &self,
        _: &str,
        _: &ItineraryItem,
        _: &[ItineraryItem],
        _: &[String],
    ) -> Result<StopDraft> {
        Err(anyhow!("{}", self.reason))
    }

    async fn place_details(&self, _: &str, _: &str) -> Result<PlaceDetails> {
        Err(anyhow!("{}", self.reason))
    }
}

// ============================================================
// Prompts
// ============================================================

fn itinerary_prompt(city: &str, lodging: Option<&Lodging>, excluded: &[String]) -> String {
    let mut prompt = match lodging {
        Some(lodging) => format!(
            "Plan a realistic one-day itinerary in {city} as a round trip that starts and ends \
             at the traveller's lodging, \"{name}\" (latitude {lat}, longitude {lng}). \
             The first item is the lodging with transport 'start' and category 'lodging'; \
             the last item returns to the same lodging with category 'lodging'.",
            name = lodging.name,
            lat = lodging.lat,
            lng = lodging.lng,
        ),
        None => format!(
            "Plan a realistic one-day itinerary in {city}, starting around 9 AM. \
             The first item uses transport 'start' and has no travel time."
        ),
    };
    prompt.push_str(
        "\nInclude lunch at a restaurant around 12:00 and dinner at a restaurant around 20:00, \
         categorised as 'restaurant'. For every item give a name, a one-sentence description, \
         a time, precise coordinates, the transport from the previous item and the travel time \
         from the previous item (e.g. \"approx. 15 mins\"). Order the items chronologically.",
    );
    if !excluded.is_empty() {
        prompt.push_str(&format!(
            "\nDo not include any of these places; the traveller has already visited them: {}.",
            excluded.join(", ")
        ));
    }
    prompt
}

fn alternative_prompt(
    city: &str,
    replacing: &ItineraryItem,
    itinerary: &[ItineraryItem],
    excluded: &[String],
) -> String {
    let previous = itinerary
        .iter()
        .position(|item| item.id == replacing.id)
        .filter(|&index| index > 0)
        .map(|index| itinerary[index - 1].name.as_str())
        .unwrap_or("the starting point");
    let day: Vec<Value> = itinerary
        .iter()
        .map(|item| json!({ "name": item.name, "time": item.time.to_string() }))
        .collect();
    let excluded = if excluded.is_empty() {
        "none".to_string()
    } else {
        excluded.join(", ")
    };

    format!(
        "Suggest one alternative stop in {city} to replace \"{name}\" at {time} ({category}): \
         \"{description}\".\n\
         It must fit the time slot around {time}, be reachable from \"{previous}\", differ from \
         \"{name}\" and must not be any of these already visited places: {excluded}.\n\
         Give a name, a one-sentence description, a time close to the original, precise \
         coordinates, the transport and travel time from the previous stop, and a category.\n\
         The whole day for context: {day}",
        name = replacing.name,
        time = replacing.time,
        category = replacing.category,
        description = replacing.description,
        day = Value::Array(day),
    )
}

// ============================================================
// Response schemas
// ============================================================

fn stop_properties(transports: &[&str], categories: &[&str]) -> Value {
    json!({
        "name": { "type": "STRING", "description": "Name of the place or activity." },
        "description": { "type": "STRING", "description": "One-sentence description." },
        "time": { "type": "STRING", "description": "Suggested time, e.g. '13:30'." },
        "lat": { "type": "NUMBER", "description": "Latitude." },
        "lng": { "type": "NUMBER", "description": "Longitude." },
        "transport": { "type": "STRING", "enum": transports },
        "category": { "type": "STRING", "enum": categories },
        "travelTime": { "type": "STRING", "description": "Travel time from the previous stop." },
    })
}

fn itinerary_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "itinerary": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": stop_properties(
                        &["walk", "metro", "bus", "taxi", "start", "car"],
                        &["activity", "landmark", "restaurant", "lodging", "shop", "other"],
                    ),
                    "required": ["name", "description", "time", "lat", "lng", "transport", "category"],
                },
            },
        },
        "required": ["itinerary"],
    })
}

fn alternative_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": stop_properties(
            &["walk", "metro", "bus", "taxi", "car"],
            &["activity", "landmark", "restaurant", "shop", "other"],
        ),
        "required": ["name", "description", "time", "lat", "lng", "transport", "category", "travelTime"],
    })
}

fn place_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "description": { "type": "STRING" },
            "lat": { "type": "NUMBER" },
            "lng": { "type": "NUMBER" },
        },
        "required": ["name", "description", "lat", "lng"],
    })
}

fn travel_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "transport": { "type": "STRING", "enum": ["walk", "metro", "bus", "taxi", "car"] },
            "travelTime": { "type": "STRING" },
        },
        "required": ["transport", "travelTime"],
    })
}

// ============================================================
// Response coercion
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStop {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    time: String,
    lat: Option<f64>,
    lng: Option<f64>,
    #[serde(default)]
    transport: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    travel_time: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

impl RawStop {
    fn into_draft(self) -> Result<StopDraft> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            bail!("stop without a name");
        }
        let (Some(lat), Some(lng)) = (self.lat, self.lng) else {
            bail!("stop '{name}' has no coordinates");
        };
        if !Coordinates::new(lat, lng).is_valid() {
            bail!("stop '{name}' has invalid coordinates {lat}, {lng}");
        }
        Ok(StopDraft {
            name,
            description: self.description.trim().to_string(),
            time: StopTime::parse(&self.time),
            lat,
            lng,
            transport: Transport::parse(&self.transport).unwrap_or(Transport::Walk),
            category: Category::parse(&self.category).unwrap_or(Category::Other),
            travel_time: self.travel_time.filter(|t| !t.trim().is_empty()),
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawItinerary {
    itinerary: Option<Vec<RawStop>>,
}

/// Strips a surrounding markdown code fence, if any.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_itinerary(text: &str, lodging: Option<&Lodging>) -> Result<Vec<StopDraft>> {
    let raw: RawItinerary =
        serde_json::from_str(extract_json(text)).context("invalid itinerary JSON from planner")?;
    let Some(raw_stops) = raw.itinerary else {
        bail!("invalid itinerary format received from planner");
    };

    let mut stops = Vec::with_capacity(raw_stops.len() + 2);
    for raw_stop in raw_stops {
        match raw_stop.into_draft() {
            Ok(stop) => stops.push(stop),
            Err(err) => warn!(error = %err, "dropping malformed stop from generated itinerary"),
        }
    }
    if stops.is_empty() {
        bail!("planner returned no usable stops");
    }

    if let Some(lodging) = lodging {
        add_lodging_anchors(&mut stops, lodging);
    }
    if let Some(first) = stops.first_mut() {
        first.transport = Transport::Start;
        first.travel_time = None;
    }
    Ok(stops)
}

fn add_lodging_anchors(stops: &mut Vec<StopDraft>, lodging: &Lodging) {
    let anchor = |description: &str, time: StopTime, transport: Transport| StopDraft {
        name: lodging.name.clone(),
        description: description.to_string(),
        time,
        lat: lodging.lat,
        lng: lodging.lng,
        transport,
        category: Category::Lodging,
        travel_time: None,
        image_url: None,
    };

    if stops.first().map(|s| s.category) != Some(Category::Lodging) {
        let time = stops.first().map(|s| s.time.clone()).unwrap_or_else(|| StopTime::parse(""));
        stops.insert(0, anchor("Start the day at your lodging.", time, Transport::Start));
    }
    if stops.len() < 2 || stops.last().map(|s| s.category) != Some(Category::Lodging) {
        let time = stops.last().map(|s| s.time.clone()).unwrap_or_else(|| StopTime::parse(""));
        stops.push(StopDraft {
            travel_time: Some("N/A".to_string()),
            ..anchor("Return to lodging.", time, Transport::Taxi)
        });
    }
}

fn parse_alternative(text: &str) -> Result<StopDraft> {
    let raw: RawStop =
        serde_json::from_str(extract_json(text)).context("invalid alternative JSON from planner")?;
    let mut draft = raw
        .into_draft()
        .context("invalid alternative format received from planner")?;
    if draft.transport == Transport::Start {
        draft.transport = Transport::Walk;
    }
    Ok(draft)
}

fn parse_place_details(text: &str, requested: &str) -> Result<PlaceDetails> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawPlace {
        #[serde(default)]
        name: String,
        #[serde(default)]
        description: String,
        lat: Option<f64>,
        lng: Option<f64>,
        #[serde(default)]
        image_url: Option<String>,
    }

    let raw: RawPlace =
        serde_json::from_str(extract_json(text)).context("invalid place JSON from planner")?;
    let (lat, lng) = match (raw.lat, raw.lng) {
        (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 && Coordinates::new(lat, lng).is_valid() => {
            (lat, lng)
        }
        _ => bail!("could not find coordinates for {requested}"),
    };
    let name = match raw.name.trim() {
        "" => requested.trim().to_string(),
        name => name.to_string(),
    };
    Ok(PlaceDetails {
        name,
        description: raw.description.trim().to_string(),
        lat,
        lng,
        image_url: raw.image_url,
    })
}

fn parse_travel_estimate(text: &str) -> TravelEstimate {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawEstimate {
        #[serde(default)]
        transport: String,
        #[serde(default)]
        travel_time: String,
    }

    let raw: RawEstimate = match serde_json::from_str(extract_json(text)) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "unusable travel estimate; using default");
            return TravelEstimate::default();
        }
    };
    let transport = match Transport::parse(&raw.transport) {
        Some(Transport::Start) | None => Transport::Walk,
        Some(t) => t,
    };
    let travel_time = match raw.travel_time.trim() {
        "" => "N/A".to_string(),
        t => t.to_string(),
    };
    TravelEstimate {
        transport,
        travel_time,
    }
}
