use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::storage::{load_namespace, save_namespace, KeyValueStore, VISITED_PLACES_KEY};

type Places = BTreeMap<String, BTreeSet<String>>;

/// Per-city record of places the user has already been to. Generation
/// requests exclude these names.
///
/// A city key never maps to an empty set: removing the last place removes
/// the city.
pub struct VisitedLedger {
    store: Arc<dyn KeyValueStore>,
    places: Places,
    load_warning: Option<String>,
}

impl VisitedLedger {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let loaded = load_namespace::<Places>(store.as_ref(), VISITED_PLACES_KEY)?;
        let mut places = loaded.value;
        places.retain(|_, set| !set.is_empty());
        Ok(Self {
            store,
            places,
            load_warning: loaded.warning,
        })
    }

    /// Returns true when the place was not recorded before.
    pub fn record_visited(&mut self, city: &str, place: &str) -> Result<bool> {
        let (city, place) = (city.trim(), place.trim());
        if city.is_empty() || place.is_empty() || self.contains(city, place) {
            return Ok(false);
        }
        let mut next = self.places.clone();
        next.entry(city.to_string())
            .or_default()
            .insert(place.to_string());
        self.commit(next)?;
        info!(city, place, "recorded visited place");
        Ok(true)
    }

    pub fn forget(&mut self, city: &str, place: &str) -> Result<bool> {
        let (city, place) = (city.trim(), place.trim());
        if !self.contains(city, place) {
            return Ok(false);
        }
        let mut next = self.places.clone();
        if let Some(set) = next.get_mut(city) {
            set.remove(place);
            if set.is_empty() {
                next.remove(city);
            }
        }
        self.commit(next)?;
        info!(city, place, "forgot visited place");
        Ok(true)
    }

    pub fn clear_city(&mut self, city: &str) -> Result<bool> {
        let city = city.trim();
        if !self.places.contains_key(city) {
            return Ok(false);
        }
        let mut next = self.places.clone();
        next.remove(city);
        self.commit(next)?;
        info!(city, "cleared visited places");
        Ok(true)
    }

    /// Exclusion list for `city`; empty when nothing was recorded.
    pub fn list_for(&self, city: &str) -> Vec<String> {
        self.places
            .get(city.trim())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, city: &str, place: &str) -> bool {
        self.places
            .get(city.trim())
            .is_some_and(|set| set.contains(place.trim()))
    }

    pub fn has_visited_places(&self, city: &str) -> bool {
        self.places.contains_key(city.trim())
    }

    pub fn cities(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.places.iter().map(|(city, set)| (city.as_str(), set))
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn take_load_warning(&mut self) -> Option<String> {
        self.load_warning.take()
    }

    fn commit(&mut self, next: Places) -> Result<()> {
        save_namespace(self.store.as_ref(), VISITED_PLACES_KEY, &next)?;
        self.places = next;
        Ok(())
    }
}
