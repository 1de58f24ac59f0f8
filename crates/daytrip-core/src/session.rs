use std::collections::HashSet;

use daytrip_schema::{
    Category, Coordinates, ItineraryItem, Lodging, ManualStop, PlaceDetails, StopDraft, StopId,
    StopTime, Transport, TripId, TripPlan,
};
use tracing::{info, warn};

use crate::catalog::TripCatalog;
use crate::error::{PlannerError, PlannerResult};
use crate::generation::TravelEstimator;
use crate::ledger::VisitedLedger;

/// Time shown on stops added from the visited-places shortcut until the
/// user edits it.
pub const ADJUST_TIME: &str = "Adjust time";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Never saved; there is no catalog entry for this session.
    Unsaved,
    InSync,
    /// Saved before, changed since.
    Modified,
}

/// Field-wise edit for [`TripSession::update_item`]. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default)]
pub struct StopPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub time: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub transport: Option<Transport>,
    pub category: Option<Category>,
    pub travel_time: Option<String>,
}

/// Everything the generation gateway needs to suggest a replacement,
/// captured when the replacement starts.
#[derive(Debug, Clone)]
pub struct ReplacementRequest {
    pub city: String,
    pub item: ItineraryItem,
    pub itinerary: Vec<ItineraryItem>,
}

/// The live, possibly unsaved, itinerary being edited.
///
/// Stops are always addressed by id. A stop with a suggestion in flight
/// is marked pending and refuses edits, removal and a second replacement
/// until the suggestion lands or fails.
#[derive(Debug, Clone, Default)]
pub struct TripSession {
    city: String,
    trip_name: String,
    lodging: Option<Lodging>,
    items: Vec<ItineraryItem>,
    trip_id: Option<TripId>,
    modified: bool,
    pending: HashSet<StopId>,
}

impl TripSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn trip_name(&self) -> &str {
        &self.trip_name
    }

    pub fn lodging(&self) -> Option<&Lodging> {
        self.lodging.as_ref()
    }

    pub fn set_lodging(&mut self, lodging: Option<Lodging>) {
        self.lodging = lodging;
    }

    pub fn items(&self) -> &[ItineraryItem] {
        &self.items
    }

    pub fn item(&self, id: &StopId) -> Option<&ItineraryItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn trip_id(&self) -> Option<&TripId> {
        self.trip_id.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_pending(&self, id: &StopId) -> bool {
        self.pending.contains(id)
    }

    pub fn save_state(&self) -> SaveState {
        match (&self.trip_id, self.modified) {
            (None, _) => SaveState::Unsaved,
            (Some(_), true) => SaveState::Modified,
            (Some(_), false) => SaveState::InSync,
        }
    }

    pub fn needs_save(&self) -> bool {
        !self.items.is_empty() && self.save_state() != SaveState::InSync
    }

    pub fn snapshot(&self) -> Vec<ItineraryItem> {
        self.items.clone()
    }

    /// Looks a stop up by exact id, 1-based position or unique id prefix.
    pub fn find_stop(&self, reference: &str) -> Option<&ItineraryItem> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if let Some(item) = self.items.iter().find(|item| item.id.as_str() == reference) {
            return Some(item);
        }
        if let Ok(position) = reference.parse::<usize>() {
            return position.checked_sub(1).and_then(|index| self.items.get(index));
        }
        let mut matches = self
            .items
            .iter()
            .filter(|item| item.id.as_str().starts_with(reference));
        match (matches.next(), matches.next()) {
            (Some(item), None) => Some(item),
            _ => None,
        }
    }

    // ============================================================
    // Lifecycle
    // ============================================================

    /// Drops the current itinerary and binding before a new plan is
    /// generated for `city`.
    pub fn start_plan(&mut self, city: &str, lodging: Option<Lodging>) {
        *self = Self {
            city: city.trim().to_string(),
            lodging,
            ..Self::default()
        };
    }

    pub fn replace_all(&mut self, items: Vec<ItineraryItem>) {
        self.items = items;
        self.pending.clear();
        self.modified = false;
    }

    /// Installs a freshly generated itinerary. The session stays unbound
    /// until it is saved.
    pub fn accept_generated(&mut self, drafts: Vec<StopDraft>) {
        let items = drafts
            .into_iter()
            .map(|draft| draft.into_item(StopId::generate()))
            .collect();
        self.replace_all(items);
        self.trip_name = format!("{} Trip", self.city);
    }

    pub fn load(&mut self, trip: &TripPlan) {
        self.city = trip.city.clone();
        self.trip_name = trip.name.clone();
        self.lodging = None;
        self.trip_id = Some(trip.id.clone());
        self.replace_all(trip.itinerary.clone());
    }

    pub fn save(&mut self, catalog: &mut TripCatalog) -> PlannerResult<TripId> {
        if self.items.is_empty() {
            return Err(PlannerError::EmptyItinerary);
        }
        let name = self.trip_name.trim().to_string();
        if name.is_empty() {
            return Err(PlannerError::EmptyTripName);
        }

        let updated = match &self.trip_id {
            Some(id) => catalog
                .update(id, &name, self.snapshot())
                .map_err(PlannerError::Storage)?,
            None => false,
        };
        let id = match (&self.trip_id, updated) {
            (Some(id), true) => id.clone(),
            (bound, _) => {
                if let Some(stale) = bound {
                    warn!(trip_id = %stale, "bound trip no longer in catalog; saving as new");
                }
                catalog
                    .create(&name, &self.city, self.snapshot())
                    .map_err(PlannerError::Storage)?
            }
        };

        self.trip_name = name;
        self.trip_id = Some(id.clone());
        self.modified = false;
        Ok(id)
    }

    pub fn rename(&mut self, name: &str) -> PlannerResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlannerError::EmptyTripName);
        }
        if name != self.trip_name {
            self.trip_name = name.to_string();
            self.touch();
        }
        Ok(())
    }

    /// The modified flag only means something once the session is bound
    /// to a catalog entry.
    fn touch(&mut self) {
        if self.trip_id.is_some() {
            self.modified = true;
        }
    }

    // ============================================================
    // Ordering
    // ============================================================

    /// Moves `moved` to sit immediately before `target`. Times are not
    /// re-sorted. Returns false when nothing changed.
    pub fn reorder(&mut self, moved: &StopId, target: &StopId) -> bool {
        if moved == target {
            return false;
        }
        let (Some(from), Some(_)) = (self.index_of(moved), self.index_of(target)) else {
            return false;
        };
        let item = self.items.remove(from);
        let to = self
            .items
            .iter()
            .position(|i| &i.id == target)
            .unwrap_or(self.items.len());
        self.items.insert(to, item);
        if to == from {
            return false;
        }
        self.touch();
        info!(stop_id = %moved, before = %target, "reordered stop");
        true
    }

    /// Index before the first stop strictly later than `time`, or the end.
    pub fn position_for_time(&self, time: &StopTime) -> usize {
        self.items
            .iter()
            .position(|item| item.time.is_later_than(time))
            .unwrap_or(self.items.len())
    }

    /// Where travel to a stop inserted at `index` starts from: the nearest
    /// earlier stop not later than `time`, else the lodging, else the first
    /// stop.
    pub fn reference_stop(&self, index: usize, time: &StopTime) -> Option<Coordinates> {
        let end = index.min(self.items.len());
        self.items[..end]
            .iter()
            .rev()
            .find(|item| !item.time.is_later_than(time))
            .map(ItineraryItem::coordinates)
            .or_else(|| self.lodging.as_ref().map(Lodging::coordinates))
            .or_else(|| self.items.first().map(ItineraryItem::coordinates))
    }

    /// Inserts a manually entered stop in time order. The travel estimate
    /// from the reference stop is fetched first; if it fails nothing is
    /// inserted.
    pub async fn insert_by_time<E>(&mut self, stop: ManualStop, estimator: &E) -> PlannerResult<StopId>
    where
        E: TravelEstimator + ?Sized,
    {
        let name = stop.name.trim();
        if name.is_empty() {
            return Err(PlannerError::MissingName);
        }
        if stop.time.trim().is_empty() {
            return Err(PlannerError::MissingTime);
        }
        let to = stop.coordinates();
        if !to.is_valid() {
            return Err(PlannerError::InvalidCoordinates {
                lat: stop.lat,
                lng: stop.lng,
            });
        }

        let time = StopTime::parse(&stop.time);
        let index = self.position_for_time(&time);
        let from = self
            .reference_stop(index, &time)
            .ok_or(PlannerError::NoReferenceStop)?;
        let estimate = estimator
            .travel_estimate(from, to, &self.city)
            .await
            .map_err(PlannerError::Gateway)?;

        let id = StopId::generate();
        let item = ItineraryItem {
            id: id.clone(),
            name: name.to_string(),
            description: stop.description.trim().to_string(),
            time,
            lat: stop.lat,
            lng: stop.lng,
            transport: estimate.transport,
            category: stop.category,
            travel_time: Some(estimate.travel_time),
            image_url: None,
        };
        self.items.insert(index, item);
        self.touch();
        info!(stop_id = %id, index, "inserted stop");
        Ok(id)
    }

    // ============================================================
    // Item edits
    // ============================================================

    pub fn update_item(&mut self, id: &StopId, patch: StopPatch) -> PlannerResult<()> {
        let index = self.editable_index(id)?;
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PlannerError::MissingName);
        }
        if patch.time.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(PlannerError::MissingTime);
        }
        if let Some(c) = patch.coordinates.filter(|c| !c.is_valid()) {
            return Err(PlannerError::InvalidCoordinates { lat: c.lat, lng: c.lng });
        }

        let item = &mut self.items[index];
        let before = item.clone();
        if let Some(name) = patch.name {
            item.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            item.description = description;
        }
        if let Some(time) = patch.time {
            item.time = StopTime::parse(&time);
        }
        if let Some(coordinates) = patch.coordinates {
            item.lat = coordinates.lat;
            item.lng = coordinates.lng;
        }
        if let Some(transport) = patch.transport {
            item.transport = transport;
        }
        if let Some(category) = patch.category {
            item.category = category;
        }
        if let Some(travel_time) = patch.travel_time {
            item.travel_time = Some(travel_time);
        }
        if *item != before {
            self.touch();
        }
        Ok(())
    }

    /// Anchor stops of a round trip are refused.
    pub fn remove_item(&mut self, id: &StopId) -> PlannerResult<ItineraryItem> {
        let index = self.editable_index(id)?;
        if self.is_anchor_at(index) {
            return Err(PlannerError::AnchorStopProtected(id.clone()));
        }
        let removed = self.items.remove(index);
        self.touch();
        info!(stop_id = %id, name = %removed.name, "removed stop");
        Ok(removed)
    }

    pub fn is_anchor_stop(&self, id: &StopId) -> bool {
        self.index_of(id).is_some_and(|index| self.is_anchor_at(index))
    }

    fn is_anchor_at(&self, index: usize) -> bool {
        let last = self.items.len().saturating_sub(1);
        self.items
            .get(index)
            .is_some_and(|item| item.category == Category::Lodging && (index == 0 || index == last))
    }

    fn index_of(&self, id: &StopId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    fn editable_index(&self, id: &StopId) -> PlannerResult<usize> {
        let index = self
            .index_of(id)
            .ok_or_else(|| PlannerError::StopNotFound(id.clone()))?;
        if self.pending.contains(id) {
            return Err(PlannerError::ReplacementPending(id.clone()));
        }
        Ok(index)
    }

    // ============================================================
    // Replacement
    // ============================================================

    /// Marks the stop pending and captures the request for the gateway.
    pub fn begin_replacement(&mut self, id: &StopId) -> PlannerResult<ReplacementRequest> {
        if self.city.trim().is_empty() {
            return Err(PlannerError::NoActiveCity);
        }
        let index = self.editable_index(id)?;
        if self.is_anchor_at(index) {
            return Err(PlannerError::AnchorStopProtected(id.clone()));
        }
        self.pending.insert(id.clone());
        Ok(ReplacementRequest {
            city: self.city.clone(),
            item: self.items[index].clone(),
            itinerary: self.items.clone(),
        })
    }

    /// Clears the pending marker and applies the outcome if the stop still
    /// exists.
    pub fn finish_replacement(
        &mut self,
        id: &StopId,
        outcome: anyhow::Result<StopDraft>,
        ledger: &mut VisitedLedger,
    ) -> PlannerResult<()> {
        self.pending.remove(id);
        let draft = outcome.map_err(PlannerError::Gateway)?;
        self.replace_content(id, draft, ledger)
    }

    /// Swaps in new content under the same id and records the replaced
    /// name as visited.
    pub fn replace_content(
        &mut self,
        id: &StopId,
        draft: StopDraft,
        ledger: &mut VisitedLedger,
    ) -> PlannerResult<()> {
        let index = self.editable_index(id)?;
        let replaced = self.items[index].name.clone();
        ledger
            .record_visited(&self.city, &replaced)
            .map_err(PlannerError::Storage)?;
        self.items[index].replace_content(draft);
        self.touch();
        info!(stop_id = %id, replaced = %replaced, with = %self.items[index].name, "replaced stop");
        Ok(())
    }

    // ============================================================
    // Visited places
    // ============================================================

    /// Returns true when the name was newly recorded.
    pub fn mark_visited(&self, id: &StopId, ledger: &mut VisitedLedger) -> PlannerResult<bool> {
        if self.city.trim().is_empty() {
            return Err(PlannerError::NoActiveCity);
        }
        let index = self
            .index_of(id)
            .ok_or_else(|| PlannerError::StopNotFound(id.clone()))?;
        if self.is_anchor_at(index) {
            return Err(PlannerError::AnchorStopProtected(id.clone()));
        }
        ledger
            .record_visited(&self.city, &self.items[index].name)
            .map_err(PlannerError::Storage)
    }

    pub fn is_visited(&self, id: &StopId, ledger: &VisitedLedger) -> bool {
        self.item(id)
            .is_some_and(|item| ledger.contains(&self.city, &item.name))
    }

    /// Appends a previously visited place at the end of the day.
    pub fn append_place(&mut self, details: PlaceDetails) -> StopId {
        let id = StopId::generate();
        self.items.push(ItineraryItem {
            id: id.clone(),
            name: details.name,
            description: details.description,
            time: StopTime::parse(ADJUST_TIME),
            lat: details.lat,
            lng: details.lng,
            transport: Transport::Car,
            category: Category::Other,
            travel_time: Some("N/A".to_string()),
            image_url: details.image_url,
        });
        self.touch();
        id
    }
}
