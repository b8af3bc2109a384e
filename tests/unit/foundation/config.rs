use super::*;

#[test]
fn partial_json_fills_defaults() {
    let cfg = EngineConfig::from_json_str(r#"{ "preview": false, "media": { "ring_slots": 4 } }"#)
        .unwrap();
    assert!(!cfg.preview);
    assert_eq!(cfg.preview_size, DEFAULT_PREVIEW_SIZE);
    assert_eq!(cfg.media.ring_slots, 4);
    assert_eq!(cfg.media.event_capacity, MediaConfig::default().event_capacity);
    assert_eq!(cfg.gpu, GpuConfig::default());
}

#[test]
fn rejects_single_slot_ring() {
    let err = EngineConfig::from_json_str(r#"{ "media": { "ring_slots": 1 } }"#).unwrap_err();
    assert!(err.to_string().contains("ring_slots"));
}

#[test]
fn rejects_empty_preview() {
    let err = EngineConfig::from_json_str(r#"{ "preview_size": { "width": 0, "height": 10 } }"#)
        .unwrap_err();
    assert!(err.to_string().contains("preview_size"));
}

#[test]
fn default_round_trips_through_json() {
    let cfg = EngineConfig::default();
    let text = serde_json::to_string(&cfg).unwrap();
    assert_eq!(EngineConfig::from_json_str(&text).unwrap(), cfg);
}
