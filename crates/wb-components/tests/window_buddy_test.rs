//! End-to-end: config flow -> entry -> setup -> sensor -> unload

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wb_components::sun::Sun;
use wb_components::window_buddy::{self, DOMAIN};
use wb_config_entries::{
    ConfigEntries, ConfigEntrySource, ConfigEntryState, FlowManager, FlowStep,
};
use wb_core::Attributes;
use wb_state_machine::StateMachine;

struct Host {
    states: Arc<StateMachine>,
    entries: Arc<ConfigEntries>,
    flows: FlowManager,
    integration: Arc<window_buddy::WindowBuddy>,
}

fn host() -> Host {
    let states = Arc::new(StateMachine::new());
    let entries = Arc::new(ConfigEntries::new());
    let flows = FlowManager::new(entries.clone());
    let integration = window_buddy::register(&entries, &flows, states.clone());
    Host {
        states,
        entries,
        flows,
        integration,
    }
}

fn set_sun(states: &StateMachine, azimuth: f64, elevation: f64) {
    states.set(
        "sun.sun".parse().unwrap(),
        "above_horizon",
        Attributes::from([
            ("azimuth".to_string(), json!(azimuth)),
            ("elevation".to_string(), json!(elevation)),
        ]),
    );
}

async fn create_window(host: &Host, user: serde_json::Value, azimuth: f64) -> String {
    let result = host
        .flows
        .start_flow(DOMAIN, ConfigEntrySource::User)
        .await
        .unwrap();
    let result = host
        .flows
        .progress_flow(&result.flow_id, Some(user))
        .await
        .unwrap();
    let result = host
        .flows
        .progress_flow(&result.flow_id, Some(json!({ "azimuth": azimuth })))
        .await
        .unwrap();
    assert!(matches!(result.step, FlowStep::CreateEntry { .. }));
    result.entry_id.unwrap()
}

#[tokio::test]
async fn test_simple_window_lifecycle() {
    let host = host();
    set_sun(&host.states, 135.0, 30.0);

    let entry_id = create_window(&host, json!({"name": "Living Room"}), 180.0).await;
    let entry = host.entries.get(&entry_id).unwrap();
    assert_eq!(entry.domain, DOMAIN);
    assert_eq!(entry.title, "Living Room");
    assert_eq!(entry.source, ConfigEntrySource::User);
    assert!(host.flows.list_flows().await.is_empty());

    let state = host.entries.setup(&entry_id).await.unwrap();
    assert_eq!(state, ConfigEntryState::Loaded);

    let sensor = host.integration.sensor(&entry_id).unwrap();
    assert_eq!(sensor.unique_id(), format!("{}_sun_exposure", entry_id));
    assert_eq!(sensor.entity_id().to_string(), "sensor.living_room");
    assert_eq!(
        host.states.get_state("sensor.living_room").as_deref(),
        Some("50")
    );

    set_sun(&host.states, 180.0, 45.0);
    assert_eq!(host.integration.update_all(), 1);
    assert_eq!(
        host.states.get_state("sensor.living_room").as_deref(),
        Some("100")
    );

    let state = host.entries.unload(&entry_id).await.unwrap();
    assert_eq!(state, ConfigEntryState::NotLoaded);
    assert!(host.states.get("sensor.living_room").is_none());
    assert_eq!(host.integration.sensor_count(), 0);
}

#[tokio::test]
async fn test_sensor_reads_published_sun() {
    let host = host();
    let sun = Sun::new(52.52, 13.4).unwrap();
    // Solar noon in Berlin, sun due south
    sun.update(&host.states, Utc.with_ymd_and_hms(2024, 6, 21, 11, 8, 0).unwrap());

    let entry_id = create_window(&host, json!({"name": "South"}), 180.0).await;
    host.entries.setup(&entry_id).await.unwrap();
    let value: f64 = host
        .states
        .get_state("sensor.south")
        .unwrap()
        .parse()
        .unwrap();
    assert!(value > 98.0, "value {}", value);

    sun.update(&host.states, Utc.with_ymd_and_hms(2024, 6, 21, 23, 8, 0).unwrap());
    host.integration.update_all();
    assert_eq!(host.states.get_state("sensor.south").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_duplicate_names_get_distinct_entities() {
    let host = host();
    let first = create_window(&host, json!({"name": "Office"}), 90.0).await;
    let second = create_window(&host, json!({"name": "Office"}), 270.0).await;
    host.entries.setup(&first).await.unwrap();
    host.entries.setup(&second).await.unwrap();

    assert!(host.states.get("sensor.office").is_some());
    assert!(host.states.get("sensor.office_2").is_some());
}

#[tokio::test]
async fn test_invalid_entry_data_fails_setup() {
    let host = host();
    let entry = host.entries.add(wb_config_entries::ConfigEntry::new(DOMAIN, "Broken"));

    let state = host.entries.setup(&entry.entry_id).await.unwrap();
    assert_eq!(state, ConfigEntryState::SetupError);
    assert!(host.entries.get(&entry.entry_id).unwrap().reason.is_some());

    // Unloading a failed entry does not reach the integration
    let state = host.entries.unload(&entry.entry_id).await.unwrap();
    assert_eq!(state, ConfigEntryState::NotLoaded);
}

#[tokio::test]
async fn test_yaml_import() {
    let host = host();
    let section: serde_yaml::Value = serde_yaml::from_str(
        r#"
- name: Living Room
  calculation_mode: simple
  entity_id: sun.sun
  azimuth: 180
- name: Attic
  calculation_mode: precise
  azimuth: 180
  width: 2
  height: 3
  block_top_side: 0.3
- name: Broken
  azimuth: 400
- azimuth: 90
"#,
    )
    .unwrap();

    let created = window_buddy::import_from_yaml(&host.flows, &section).await;
    assert_eq!(created.len(), 2);
    assert!(host.flows.list_flows().await.is_empty());

    for entry_id in &created {
        let entry = host.entries.get(entry_id).unwrap();
        assert_eq!(entry.source, ConfigEntrySource::Import);
        assert_eq!(
            host.entries.setup(entry_id).await.unwrap(),
            ConfigEntryState::Loaded
        );
    }

    set_sun(&host.states, 90.0, 10.0);
    host.integration.update_all();
    assert_eq!(host.states.get_state("sensor.attic").as_deref(), Some("6"));
    assert_eq!(host.states.get_state("sensor.living_room").as_deref(), Some("0"));

    assert_eq!(host.entries.unload_all().await, 2);
    assert_eq!(host.states.entity_ids("sensor").len(), 0);
}

#[tokio::test]
async fn test_import_rejects_non_list() {
    let host = host();
    let section: serde_yaml::Value = serde_yaml::from_str("name: Office\n").unwrap();
    assert!(window_buddy::import_from_yaml(&host.flows, &section).await.is_empty());
    assert!(host.entries.is_empty());
}
