use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use daytrip_schema::{ItineraryItem, TripId, TripPlan};
use tracing::info;

use crate::storage::{load_namespace, save_namespace, KeyValueStore, TRIP_PLANS_KEY};

/// Saved trips, in the order they were first saved. Every mutation is
/// written to the store before it returns.
pub struct TripCatalog {
    store: Arc<dyn KeyValueStore>,
    trips: Vec<TripPlan>,
    load_warning: Option<String>,
}

impl TripCatalog {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let loaded = load_namespace::<Vec<TripPlan>>(store.as_ref(), TRIP_PLANS_KEY)?;
        Ok(Self {
            store,
            trips: loaded.value,
            load_warning: loaded.warning,
        })
    }

    pub fn create(
        &mut self,
        name: &str,
        city: &str,
        itinerary: Vec<ItineraryItem>,
    ) -> Result<TripId> {
        let id = TripId::generate();
        let mut next = self.trips.clone();
        next.push(TripPlan {
            id: id.clone(),
            name: name.to_string(),
            city: city.to_string(),
            itinerary,
            updated_at: Some(Utc::now()),
        });
        self.commit(next)?;
        info!(trip_id = %id, name, city, "created trip");
        Ok(id)
    }

    /// Replaces name and itinerary of an existing trip. Unknown ids are
    /// ignored and reported as `false`.
    pub fn update(
        &mut self,
        id: &TripId,
        name: &str,
        itinerary: Vec<ItineraryItem>,
    ) -> Result<bool> {
        let Some(index) = self.index_of(id) else {
            return Ok(false);
        };
        let mut next = self.trips.clone();
        let trip = &mut next[index];
        trip.name = name.to_string();
        trip.itinerary = itinerary;
        trip.updated_at = Some(Utc::now());
        self.commit(next)?;
        info!(trip_id = %id, name, "updated trip");
        Ok(true)
    }

    /// No-op when the trimmed name is empty or the id is unknown.
    pub fn rename(&mut self, id: &TripId, new_name: &str) -> Result<bool> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Ok(false);
        }
        let Some(index) = self.index_of(id) else {
            return Ok(false);
        };
        let mut next = self.trips.clone();
        next[index].name = new_name.to_string();
        next[index].updated_at = Some(Utc::now());
        self.commit(next)?;
        info!(trip_id = %id, name = new_name, "renamed trip");
        Ok(true)
    }

    pub fn delete(&mut self, id: &TripId) -> Result<bool> {
        let Some(index) = self.index_of(id) else {
            return Ok(false);
        };
        let mut next = self.trips.clone();
        next.remove(index);
        self.commit(next)?;
        info!(trip_id = %id, "deleted trip");
        Ok(true)
    }

    pub fn list(&self) -> &[TripPlan] {
        &self.trips
    }

    pub fn get(&self, id: &TripId) -> Option<&TripPlan> {
        self.trips.iter().find(|trip| &trip.id == id)
    }

    /// Looks a trip up by exact id, then by unique id prefix.
    pub fn resolve(&self, reference: &str) -> Option<&TripPlan> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if let Some(trip) = self.trips.iter().find(|t| t.id.as_str() == reference) {
            return Some(trip);
        }
        let mut matches = self
            .trips
            .iter()
            .filter(|t| t.id.as_str().starts_with(reference));
        match (matches.next(), matches.next()) {
            (Some(trip), None) => Some(trip),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn take_load_warning(&mut self) -> Option<String> {
        self.load_warning.take()
    }

    fn index_of(&self, id: &TripId) -> Option<usize> {
        self.trips.iter().position(|trip| &trip.id == id)
    }

    fn commit(&mut self, next: Vec<TripPlan>) -> Result<()> {
        save_namespace(self.store.as_ref(), TRIP_PLANS_KEY, &next)?;
        self.trips = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use daytrip_schema::{Category, StopId, StopTime, Transport};

    fn item(id: &str, name: &str, time: &str) -> ItineraryItem {
        ItineraryItem {
            id: StopId::from(id),
            name: name.into(),
            description: String::new(),
            time: StopTime::parse(time),
            lat: 38.7,
            lng: -9.1,
            transport: Transport::Walk,
            category: Category::Landmark,
            travel_time: Some("approx. 10 mins".into()),
            image_url: None,
        }
    }

    fn catalog() -> (Arc<InMemoryStore>, TripCatalog) {
        let store = Arc::new(InMemoryStore::default());
        let catalog = TripCatalog::open(store.clone()).unwrap();
        (store, catalog)
    }

    #[test]
    fn create_then_list_round_trips_itinerary() {
        let (_, mut catalog) = catalog();
        let items = vec![item("a", "Alfama", "09:00"), item("b", "Baixa", "11:00")];
        let id = catalog.create("Lisbon Trip", "Lisbon", items.clone()).unwrap();

        let trips = catalog.list();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].id, id);
        assert_eq!(trips[0].itinerary, items);
        assert_eq!(trips[0].city, "Lisbon");
    }

    #[test]
    fn update_replaces_without_duplicating() {
        let (_, mut catalog) = catalog();
        let id = catalog
            .create("Lisbon Trip", "Lisbon", vec![item("a", "Alfama", "09:00")])
            .unwrap();
        let items2 = vec![item("c", "Chiado", "10:00")];
        assert!(catalog.update(&id, "Lisbon again", items2.clone()).unwrap());

        let matching: Vec<_> = catalog.list().iter().filter(|t| t.id == id).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].name, "Lisbon again");
        assert_eq!(matching[0].itinerary, items2);
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let (_, mut catalog) = catalog();
        assert!(!catalog
            .update(&TripId::from("missing"), "x", Vec::new())
            .unwrap());
        assert!(catalog.is_empty());
    }

    #[test]
    fn rename_ignores_blank_names_and_trims() {
        let (_, mut catalog) = catalog();
        let id = catalog.create("Trip", "Rome", Vec::new()).unwrap();
        assert!(!catalog.rename(&id, "   ").unwrap());
        assert_eq!(catalog.get(&id).unwrap().name, "Trip");
        assert!(catalog.rename(&id, "  Roman holiday ").unwrap());
        assert_eq!(catalog.get(&id).unwrap().name, "Roman holiday");
    }

    #[test]
    fn delete_keeps_insertion_order_of_others() {
        let (_, mut catalog) = catalog();
        let a = catalog.create("A", "Rome", Vec::new()).unwrap();
        let b = catalog.create("B", "Oslo", Vec::new()).unwrap();
        let c = catalog.create("C", "Kyiv", Vec::new()).unwrap();
        assert!(catalog.delete(&b).unwrap());
        assert!(!catalog.delete(&b).unwrap());
        let ids: Vec<_> = catalog.list().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn mutations_are_persisted_immediately() {
        let (store, mut catalog) = catalog();
        let id = catalog
            .create("Lisbon Trip", "Lisbon", vec![item("a", "Alfama", "9:00 AM")])
            .unwrap();
        let reopened = TripCatalog::open(store.clone()).unwrap();
        assert_eq!(reopened.list(), catalog.list());

        let raw = store.get(TRIP_PLANS_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["id"], id.as_str());
        assert_eq!(json[0]["itinerary"][0]["travelTime"], "approx. 10 mins");
    }

    #[test]
    fn resolve_by_unique_prefix() {
        let store = Arc::new(InMemoryStore::default());
        store
            .set(
                TRIP_PLANS_KEY,
                r#"[{"id":"1700000000001","name":"A","city":"Rome","itinerary":[]},
                    {"id":"1700000000002","name":"B","city":"Oslo","itinerary":[]},
                    {"id":"2800000000000","name":"C","city":"Kyiv","itinerary":[]}]"#,
            )
            .unwrap();
        let catalog = TripCatalog::open(store).unwrap();
        assert_eq!(catalog.resolve("28").unwrap().name, "C");
        assert!(catalog.resolve("17").is_none());
        assert_eq!(catalog.resolve("1700000000002").unwrap().name, "B");
        assert!(catalog.resolve("").is_none());
    }

    #[test]
    fn corrupt_catalog_opens_empty_with_warning() {
        let store = Arc::new(InMemoryStore::default());
        store.set(TRIP_PLANS_KEY, "{\"not\": \"a list\"}").unwrap();
        let mut catalog = TripCatalog::open(store).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.take_load_warning().is_some());
    }
}
