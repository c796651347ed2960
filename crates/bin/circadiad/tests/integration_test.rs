//! End-to-end reconciliation against the real `SQLite` store and a recording
//! gateway: push, echo suppression, manual override and its expiry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use circadia_adapter_storage_sqlite_sqlx::{Config, SqliteLightStore};
use circadia_app::locks::LightLocks;
use circadia_app::ports::{DeviceGateway, EventStream, LightStore};
use circadia_app::services::logical_state::{EventOutcome, LogicalStateManager};
use circadia_app::services::physical_sync::PhysicalSync;
use circadia_app::throttle::Throttle;
use circadia_domain::error::CircadiaError;
use circadia_domain::id::{LightId, SceneId};
use circadia_domain::light::{Light, LightState, Scene};
use circadia_domain::schedule::{
    DayPattern, DefaultStep, PatternKind, PatternStep, Schedule, ScheduleCatalog, ScheduleEngine,
    StepAnchor,
};
use circadia_domain::time::Timestamp;

#[derive(Default)]
struct RecordingGateway {
    pushes: Mutex<Vec<(LightId, LightState)>>,
}

impl RecordingGateway {
    fn pushes(&self) -> Vec<(LightId, LightState)> {
        self.pushes.lock().unwrap().clone()
    }
}

impl DeviceGateway for RecordingGateway {
    fn discover_lights(
        &self,
        _schedules: &[Schedule],
    ) -> impl Future<Output = Result<Vec<Light>, CircadiaError>> + Send {
        async { Ok(Vec::new()) }
    }

    fn discover_scenes(
        &self,
        _schedules: &[Schedule],
    ) -> impl Future<Output = Result<Vec<Scene>, CircadiaError>> + Send {
        async { Ok(Vec::new()) }
    }

    fn update_light_state(
        &self,
        id: &LightId,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        self.pushes.lock().unwrap().push((id.clone(), state));
        async { Ok(()) }
    }

    fn update_scene_state(
        &self,
        _id: &SceneId,
        _state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        async { Ok(()) }
    }

    fn subscribe_to_events(
        &self,
    ) -> impl Future<Output = Result<EventStream, CircadiaError>> + Send {
        async { Ok(Box::pin(tokio_stream::empty()) as EventStream) }
    }
}

fn ts(s: &str) -> Timestamp {
    s.parse().unwrap()
}

fn step(time: StepAnchor, temperature: u32) -> PatternStep {
    PatternStep {
        time,
        temperature,
        brightness: 80,
        transition_at: 100,
        off: false,
    }
}

/// Cool white until 08:00, warm white afterwards, brightness 80 throughout.
fn catalog() -> ScheduleCatalog {
    let pattern = DayPattern {
        kind: PatternKind::Fixed,
        sunrise_min: None,
        sunrise_max: None,
        sunset_min: None,
        sunset_max: None,
        default: DefaultStep {
            temperature: 2000,
            brightness: 80,
        },
        pattern: vec![
            step(StepAnchor::StartOfDay, 4000),
            step(StepAnchor::Clock("08:00".parse().unwrap()), 2000),
        ],
    };
    let schedule = Schedule {
        name: "office".to_string(),
        rooms: vec!["Office".to_string()],
        zones: Vec::new(),
        day_pattern: "workday".to_string(),
        auto_on: None,
        disabled: false,
    };
    ScheduleCatalog::new(vec![schedule], HashMap::from([("workday".to_string(), pattern)]))
        .unwrap()
}

fn dimming_event(at: &str, brightness: f64) -> String {
    format!(
        r#"[{{"creationtime":"{at}","id":"evt","type":"update","data":[
            {{"id":"desk","type":"light","dimming":{{"brightness":{brightness}}}}}
        ]}}]"#
    )
}

fn value_event(at: &str, brightness: f64, mirek: u16) -> String {
    format!(
        r#"[{{"creationtime":"{at}","id":"evt","type":"update","data":[
            {{"id":"desk","type":"light","dimming":{{"brightness":{brightness}}},
              "color_temperature":{{"mirek":{mirek}}}}}
        ]}}]"#
    )
}

fn on_event(at: &str) -> String {
    format!(
        r#"[{{"creationtime":"{at}","id":"evt","type":"update","data":[
            {{"id":"desk","type":"light","on":{{"on":true}}}}
        ]}}]"#
    )
}

#[tokio::test]
async fn should_hold_back_overridden_light_until_override_expires() {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .unwrap();
    let store = Arc::new(SqliteLightStore::new(db.pool().clone()));
    let gateway = Arc::new(RecordingGateway::default());
    let locks = Arc::new(LightLocks::new());
    let physical = Arc::new(PhysicalSync::new(
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::new(Throttle::new(Duration::from_millis(1))),
        Arc::clone(&locks),
        chrono_tz::UTC,
        chrono::Duration::minutes(120),
    ));
    let logical = LogicalStateManager::new(
        Arc::clone(&store),
        Arc::clone(&physical),
        locks,
        ScheduleEngine::new(chrono_tz::UTC, None),
        chrono::Duration::seconds(2),
    );
    let catalog = catalog();
    let desk = LightId::new("desk");
    logical
        .register(
            vec![
                Light::builder()
                    .id("desk")
                    .name("Desk")
                    .schedule_name("office")
                    .group_name("Office")
                    .on(true)
                    .build()
                    .unwrap(),
            ],
            Vec::new(),
        )
        .await
        .unwrap();

    // First tick pushes the morning target.
    let t0 = ts("2024-05-01T07:00:00Z");
    assert_eq!(logical.update_all_target_states(&catalog, t0).await, 1);
    let report = physical.sync_all(t0).await.unwrap().unwrap();
    assert_eq!(report.lights_pushed, 1);
    let morning = LightState {
        brightness: 80,
        temperature_mirek: 250,
        on: true,
    };
    assert_eq!(gateway.pushes(), vec![(desk.clone(), morning)]);

    // The bridge echoes our own write.
    let outcomes = logical
        .handle_bridge_payload(&on_event("2024-05-01T07:00:01Z"))
        .await;
    assert_eq!(outcomes, vec![(desk.clone(), EventOutcome::Ignored)]);
    assert_eq!(gateway.pushes().len(), 1);

    // Dimming and colour echoes land close to, not exactly on, the target.
    let outcomes = logical
        .handle_bridge_payload(&value_event("2024-05-01T07:00:01Z", 80.4, 253))
        .await;
    assert_eq!(
        outcomes,
        vec![
            (desk.clone(), EventOutcome::OverridesCleared),
            (desk.clone(), EventOutcome::OverridesCleared),
        ]
    );
    let light = store.get_light(&desk).await.unwrap().unwrap();
    assert!(light.overrides.is_empty());
    assert_eq!(gateway.pushes().len(), 1);
    let report = physical.sync_all(t0).await.unwrap().unwrap();
    assert_eq!(report.lights_pushed, 0);

    // Someone dims the light by hand.
    let outcomes = logical
        .handle_bridge_payload(&dimming_event("2024-05-01T07:03:00Z", 40.0))
        .await;
    assert_eq!(outcomes, vec![(desk.clone(), EventOutcome::OverrideRecorded)]);
    let light = store.get_light(&desk).await.unwrap().unwrap();
    let dimmed = light.overrides.brightness.unwrap();
    assert_eq!((dimmed.value, dimmed.target_at_override), (40, 80));

    // The target moves on, but the override is still fresh.
    let t1 = ts("2024-05-01T08:30:00Z");
    logical.update_all_target_states(&catalog, t1).await;
    let report = physical.sync_all(t1).await.unwrap().unwrap();
    assert_eq!(report.lights_pushed, 0);
    assert_eq!(gateway.pushes().len(), 1);

    // Once the override is older than the maximum age the light follows
    // the schedule again.
    let t2 = ts("2024-05-01T09:04:00Z");
    logical.update_all_target_states(&catalog, t2).await;
    let report = physical.sync_all(t2).await.unwrap().unwrap();
    assert_eq!(report.lights_pushed, 1);
    let evening = LightState {
        brightness: 80,
        temperature_mirek: 500,
        on: true,
    };
    assert_eq!(gateway.pushes()[1], (desk.clone(), evening));
    let light = store.get_light(&desk).await.unwrap().unwrap();
    assert!(light.overrides.is_empty());
    assert_eq!(light.last_update.unwrap().at, t2);
}
