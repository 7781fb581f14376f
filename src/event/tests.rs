use super::*;
use serde_json::json;

#[test]
fn test_domain_wire_names() {
    assert_eq!(serde_json::to_value(Domain::UserReport).unwrap(), json!("userReport"));
    assert_eq!(serde_json::to_value(Domain::Weather).unwrap(), json!("weather"));
    assert_eq!("flood".parse::<Domain>().unwrap(), Domain::Flood);
    assert!("volcano".parse::<Domain>().is_err());
}

#[test]
fn test_resource_paths() {
    let paths: Vec<&str> = Domain::ALL.iter().map(|d| d.resource_path()).collect();
    assert_eq!(paths, vec!["weather", "fires", "floods", "traffic", "reports"]);
}

#[test]
fn test_delta_deserializes_from_wire() {
    let delta: LiveDelta = serde_json::from_value(json!({
        "type": "weather",
        "action": "create",
        "data": { "id": "w1", "temperature": 18.5 },
        "timestamp": "2024-02-11T13:00:00Z"
    }))
    .unwrap();

    assert_eq!(delta.domain, Tag::Known(Domain::Weather));
    assert_eq!(delta.action, Tag::Known(DeltaAction::Create));
    assert_eq!(delta.data.id, "w1");
    assert_eq!(delta.data.get("temperature"), Some(&json!(18.5)));
    assert!(delta.emitted_at.is_some());
}

#[test]
fn test_unrecognized_domain_and_action_survive_decoding() {
    let delta: LiveDelta = serde_json::from_value(json!({
        "type": "earthquake",
        "action": "archive",
        "data": { "id": "q1" }
    }))
    .unwrap();

    assert_eq!(delta.domain, Tag::Unrecognized("earthquake".to_string()));
    assert_eq!(delta.action, Tag::Unrecognized("archive".to_string()));
    assert!(delta.emitted_at.is_none());
}

#[test]
fn test_record_keeps_unknown_fields() {
    let raw = json!({ "id": "f1", "severity": "high", "extra": { "nested": [1, 2] } });
    let record: DomainRecord = serde_json::from_value(raw.clone()).unwrap();

    assert_eq!(record.id, "f1");
    assert_eq!(serde_json::to_value(&record).unwrap(), raw);
}

#[test]
fn test_record_decodes_into_typed_view() {
    let record: DomainRecord = serde_json::from_value(json!({
        "id": "w1",
        "location": { "lat": -33.86, "lng": 151.21 },
        "temperature": 18.5,
        "windSpeed": 12.0,
        "timestamp": "2024-02-11T13:00:00Z",
        "source": "bom"
    }))
    .unwrap();

    let weather: WeatherRecord = record.decode().unwrap();
    assert_eq!(weather.temperature, 18.5);
    assert_eq!(weather.wind_speed, Some(12.0));
    assert_eq!(weather.source.as_deref(), Some("bom"));

    // A weather record is not a traffic record
    assert!(record.decode::<TrafficRecord>().is_err());
}

#[test]
fn test_user_report_type_field() {
    let record = DomainRecord::new("r1")
        .with("userId", json!("u1"))
        .with("location", json!({ "lat": -41.29, "lng": 174.78 }))
        .with("type", json!("flood"))
        .with("title", json!("Road under water"))
        .with("severity", json!("moderate"))
        .with("timestamp", json!("2024-02-11T13:00:00Z"));

    let report: UserReportRecord = record.decode().unwrap();
    assert_eq!(report.report_type, "flood");
    assert!(!report.verified);
    assert_eq!(report.votes, 0);
}
