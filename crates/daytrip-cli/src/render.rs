use chrono::Local;
use daytrip_core::{SaveState, TripSession};
use daytrip_schema::{ItineraryItem, LocationCandidate, TripPlan};

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

fn save_label(state: SaveState) -> &'static str {
    match state {
        SaveState::Unsaved => "not saved",
        SaveState::InSync => "saved",
        SaveState::Modified => "modified since last save",
    }
}

pub fn print_itinerary(session: &TripSession, visited: &[String]) {
    let trip = session
        .trip_id()
        .map(|id| format!(" [{}]", short_id(id.as_str())))
        .unwrap_or_default();
    println!(
        "{} ({}){} - {}",
        session.trip_name(),
        session.city(),
        trip,
        save_label(session.save_state())
    );
    if let Some(lodging) = session.lodging() {
        println!("Lodging: {}", lodging.name);
    }
    if session.is_empty() {
        println!("No stops.");
        return;
    }

    println!(
        "{:<3} {:<9} {:<13} {:<34} {:<11} {:<10} {:<16}",
        "#", "ID", "TIME", "STOP", "CATEGORY", "TRANSPORT", "TRAVEL"
    );
    println!("{}", "-".repeat(100));
    for (index, item) in session.items().iter().enumerate() {
        print_stop_row(index + 1, item, visited.contains(&item.name));
    }
}

fn print_stop_row(position: usize, item: &ItineraryItem, visited: bool) {
    let name = if visited {
        format!("{} (visited)", item.name)
    } else {
        item.name.clone()
    };
    println!(
        "{:<3} {:<9} {:<13} {:<34} {:<11} {:<10} {:<16}",
        position,
        short_id(item.id.as_str()),
        clip(&item.time.to_string(), 13),
        clip(&name, 34),
        item.category,
        item.transport,
        item.travel_time.as_deref().unwrap_or("-"),
    );
}

pub fn print_trips(trips: &[TripPlan]) {
    if trips.is_empty() {
        println!("No saved trips.");
        return;
    }
    println!(
        "{:<9} {:<30} {:<18} {:<6} {:<16}",
        "ID", "NAME", "CITY", "STOPS", "UPDATED"
    );
    println!("{}", "-".repeat(82));
    for trip in trips {
        let updated = trip
            .updated_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<9} {:<30} {:<18} {:<6} {:<16}",
            short_id(trip.id.as_str()),
            clip(&trip.name, 30),
            clip(&trip.city, 18),
            trip.itinerary.len(),
            updated,
        );
    }
}

pub fn print_candidates(candidates: &[LocationCandidate]) {
    if candidates.is_empty() {
        println!("No matches.");
        return;
    }
    for (index, candidate) in candidates.iter().enumerate() {
        println!(
            "{:>2}. {} ({:.5}, {:.5})",
            index + 1,
            candidate.name,
            candidate.lat,
            candidate.lng
        );
    }
}
