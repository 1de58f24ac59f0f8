use std::sync::Arc;

use daytrip_schema::{ItineraryItem, Lodging, ManualStop, StopId, TripId, TripPlan};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::catalog::TripCatalog;
use crate::error::{PlannerError, PlannerResult};
use crate::generation::PlannerGateway;
use crate::ledger::VisitedLedger;
use crate::session::{StopPatch, TripSession};
use crate::storage::KeyValueStore;

/// Runs user actions against the live session, the visited ledger and the
/// trip catalog.
///
/// Locks are always taken in the order session, ledger, catalog. No lock is
/// held across a gateway call except while a manual stop is inserted, so
/// the insertion position cannot go stale.
pub struct TripPlanner {
    gateway: Arc<dyn PlannerGateway>,
    session: Mutex<TripSession>,
    ledger: Mutex<VisitedLedger>,
    catalog: Mutex<TripCatalog>,
}

impl TripPlanner {
    pub fn new(gateway: Arc<dyn PlannerGateway>, ledger: VisitedLedger, catalog: TripCatalog) -> Self {
        Self {
            gateway,
            session: Mutex::new(TripSession::new()),
            ledger: Mutex::new(ledger),
            catalog: Mutex::new(catalog),
        }
    }

    pub fn open(gateway: Arc<dyn PlannerGateway>, store: Arc<dyn KeyValueStore>) -> PlannerResult<Self> {
        let ledger = VisitedLedger::open(store.clone()).map_err(PlannerError::Storage)?;
        let catalog = TripCatalog::open(store).map_err(PlannerError::Storage)?;
        Ok(Self::new(gateway, ledger, catalog))
    }

    pub async fn session(&self) -> MutexGuard<'_, TripSession> {
        self.session.lock().await
    }

    pub async fn ledger(&self) -> MutexGuard<'_, VisitedLedger> {
        self.ledger.lock().await
    }

    pub async fn catalog(&self) -> MutexGuard<'_, TripCatalog> {
        self.catalog.lock().await
    }

    /// Corrupt-storage warnings from opening the ledger and catalog. Each is
    /// returned once.
    pub async fn take_load_warnings(&self) -> Vec<String> {
        let mut ledger = self.ledger.lock().await;
        let mut catalog = self.catalog.lock().await;
        ledger
            .take_load_warning()
            .into_iter()
            .chain(catalog.take_load_warning())
            .collect()
    }

    // ============================================================
    // Session lifecycle
    // ============================================================

    /// Generates a fresh day plan. The current session is only replaced
    /// once generation succeeds.
    pub async fn plan_day(&self, city: &str, lodging: Option<Lodging>) -> PlannerResult<usize> {
        let city = city.trim();
        if city.is_empty() {
            return Err(PlannerError::EmptyCity);
        }
        let excluded = self.ledger.lock().await.list_for(city);
        let drafts = self
            .gateway
            .generate_itinerary(city, lodging.as_ref(), &excluded)
            .await
            .map_err(PlannerError::Gateway)?;

        let mut session = self.session.lock().await;
        session.start_plan(city, lodging);
        session.accept_generated(drafts);
        info!(city, stops = session.items().len(), "planned day");
        Ok(session.items().len())
    }

    pub async fn save(&self) -> PlannerResult<TripId> {
        let mut session = self.session.lock().await;
        let mut catalog = self.catalog.lock().await;
        session.save(&mut catalog)
    }

    /// Loads a saved trip by id or unique id prefix.
    pub async fn load(&self, reference: &str) -> PlannerResult<TripPlan> {
        let mut session = self.session.lock().await;
        let trip = self.resolve_trip(reference).await?;
        session.load(&trip);
        info!(trip_id = %trip.id, name = %trip.name, "loaded trip");
        Ok(trip)
    }

    pub async fn rename_session(&self, name: &str) -> PlannerResult<()> {
        self.session.lock().await.rename(name)
    }

    pub async fn rename_trip(&self, reference: &str, name: &str) -> PlannerResult<bool> {
        let trip = self.resolve_trip(reference).await?;
        self.catalog
            .lock()
            .await
            .rename(&trip.id, name)
            .map_err(PlannerError::Storage)
    }

    pub async fn delete_trip(&self, reference: &str) -> PlannerResult<TripPlan> {
        let trip = self.resolve_trip(reference).await?;
        self.catalog
            .lock()
            .await
            .delete(&trip.id)
            .map_err(PlannerError::Storage)?;
        Ok(trip)
    }

    async fn resolve_trip(&self, reference: &str) -> PlannerResult<TripPlan> {
        self.catalog
            .lock()
            .await
            .resolve(reference)
            .cloned()
            .ok_or_else(|| PlannerError::TripNotFound(TripId::from(reference.trim())))
    }

    // ============================================================
    // Stop actions
    // ============================================================

    /// Replaces a stop with a generated alternative and records the old
    /// name as visited.
    pub async fn suggest_alternative(&self, id: &StopId) -> PlannerResult<()> {
        let request = self.session.lock().await.begin_replacement(id)?;
        let excluded = self.ledger.lock().await.list_for(&request.city);
        let outcome = self
            .gateway
            .generate_alternative(&request.city, &request.item, &request.itinerary, &excluded)
            .await;

        let mut session = self.session.lock().await;
        let mut ledger = self.ledger.lock().await;
        session.finish_replacement(id, outcome, &mut ledger)
    }

    pub async fn mark_visited(&self, id: &StopId) -> PlannerResult<bool> {
        let session = self.session.lock().await;
        let mut ledger = self.ledger.lock().await;
        session.mark_visited(id, &mut ledger)
    }

    pub async fn is_visited(&self, id: &StopId) -> bool {
        let session = self.session.lock().await;
        let ledger = self.ledger.lock().await;
        session.is_visited(id, &ledger)
    }

    pub async fn add_stop(&self, stop: ManualStop) -> PlannerResult<StopId> {
        let mut session = self.session.lock().await;
        if session.is_empty() {
            return Err(PlannerError::EmptyItinerary);
        }
        session.insert_by_time(stop, self.gateway.as_ref()).await
    }

    /// Looks up a previously visited place and appends it to the day.
    pub async fn add_visited_place(&self, place: &str) -> PlannerResult<StopId> {
        let city = self.session.lock().await.city().to_string();
        if city.is_empty() {
            return Err(PlannerError::NoActiveCity);
        }
        let details = self
            .gateway
            .place_details(place, &city)
            .await
            .map_err(PlannerError::Gateway)?;
        Ok(self.session.lock().await.append_place(details))
    }

    pub async fn reorder(&self, moved: &StopId, target: &StopId) -> bool {
        self.session.lock().await.reorder(moved, target)
    }

    pub async fn update_stop(&self, id: &StopId, patch: StopPatch) -> PlannerResult<()> {
        self.session.lock().await.update_item(id, patch)
    }

    pub async fn remove_stop(&self, id: &StopId) -> PlannerResult<ItineraryItem> {
        self.session.lock().await.remove_item(id)
    }

    // ============================================================
    // Visited places
    // ============================================================

    pub async fn visited_for(&self, city: &str) -> Vec<String> {
        self.ledger.lock().await.list_for(city)
    }

    pub async fn forget_visited(&self, city: &str, place: &str) -> PlannerResult<bool> {
        self.ledger
            .lock()
            .await
            .forget(city, place)
            .map_err(PlannerError::Storage)
    }

    pub async fn clear_visited(&self, city: &str) -> PlannerResult<bool> {
        self.ledger
            .lock()
            .await
            .clear_city(city)
            .map_err(PlannerError::Storage)
    }
}
