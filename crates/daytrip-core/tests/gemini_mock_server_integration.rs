use std::sync::Arc;

use daytrip_core::*;
use daytrip_provider::{is_retryable, GeminiProvider};
use daytrip_schema::{Category, Coordinates, Lodging, Transport};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

fn mock_gemini_response(payload: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": payload.to_string() }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 42, "candidatesTokenCount": 17 }
    })
}

fn planner_for(server: &MockServer) -> LlmPlanner {
    let provider = GeminiProvider::with_base_url("test-key", server.uri());
    LlmPlanner::new(Arc::new(provider), DEFAULT_MODEL)
}

fn itinerary_payload() -> serde_json::Value {
    serde_json::json!({
        "itinerary": [
            {
                "name": "Hotel Avenida", "description": "Start here.", "time": "8:30 AM",
                "lat": 38.716, "lng": -9.142, "transport": "start", "category": "lodging"
            },
            {
                "name": "Castelo de São Jorge", "description": "Moorish castle.", "time": "9:30 AM",
                "lat": 38.7139, "lng": -9.1335, "transport": "taxi", "category": "landmark",
                "travelTime": "approx. 10 mins"
            },
            {
                "name": "Time Out Market", "description": "Food hall.", "time": "12:00 PM",
                "lat": 38.7069, "lng": -9.1459, "transport": "metro", "category": "restaurant",
                "travelTime": "approx. 20 mins"
            },
            {
                "name": "Hotel Avenida", "description": "Back to rest.", "time": "10:00 PM",
                "lat": 38.716, "lng": -9.142, "transport": "taxi", "category": "lodging",
                "travelTime": "approx. 15 mins"
            }
        ]
    })
}

#[tokio::test]
async fn itinerary_request_uses_structured_output() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(mock_gemini_response(&itinerary_payload())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let lodging = Lodging {
        name: "Hotel Avenida".into(),
        lat: 38.716,
        lng: -9.142,
    };
    let stops = planner_for(&server)
        .generate_itinerary("Lisbon", Some(&lodging), &["Belém Tower".into()])
        .await
        .unwrap();

    assert_eq!(stops.len(), 4);
    assert_eq!(stops[0].transport, Transport::Start);
    assert_eq!(stops[0].category, Category::Lodging);
    assert_eq!(stops[3].category, Category::Lodging);
    assert_eq!(stops[1].time.to_string(), "9:30 AM");
    assert_eq!(stops[1].time.minute_of_day(), Some(9 * 60 + 30));
    assert_eq!(stops[2].travel_time.as_deref(), Some("approx. 20 mins"));
}

#[tokio::test]
async fn rate_limited_generation_is_retryable_gateway_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .expect(1)
        .mount(&server)
        .await;

    let err = planner_for(&server)
        .generate_itinerary("Lisbon", None, &[])
        .await
        .unwrap_err();

    assert!(is_retryable(&err));
    let message = format!("{err:#}");
    assert!(message.contains("failed to generate itinerary"));
    assert!(message.contains("429"));
}

#[tokio::test]
async fn travel_estimate_reads_transport_and_duration() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_gemini_response(
            &serde_json::json!({ "transport": "bus", "travelTime": "approx. 25 mins" }),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let estimate = planner_for(&server)
        .travel_estimate(
            Coordinates::new(38.7139, -9.1335),
            Coordinates::new(38.6916, -9.2160),
            "Lisbon",
        )
        .await
        .unwrap();

    assert_eq!(estimate.transport, Transport::Bus);
    assert_eq!(estimate.travel_time, "approx. 25 mins");
}

#[tokio::test]
async fn travel_estimate_server_error_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let result = planner_for(&server)
        .travel_estimate(Coordinates::new(1.0, 1.0), Coordinates::new(1.1, 1.1), "Lisbon")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn place_details_returns_coordinates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_gemini_response(
            &serde_json::json!({
                "name": "Jerónimos Monastery",
                "description": "Manueline monastery in Belém.",
                "lat": 38.6979,
                "lng": -9.2068
            }),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let details = planner_for(&server)
        .place_details("Jeronimos", "Lisbon")
        .await
        .unwrap();

    assert_eq!(details.name, "Jerónimos Monastery");
    assert_eq!(details.lat, 38.6979);
}
