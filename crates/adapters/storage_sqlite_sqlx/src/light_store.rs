//! `SQLite` implementation of [`LightStore`].

use std::future::Future;
use std::str::FromStr;

use chrono::SecondsFormat;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use circadia_app::ports::LightStore;
use circadia_domain::error::{CircadiaError, NotFoundError};
use circadia_domain::id::{LightId, SceneId, ZigbeeId};
use circadia_domain::light::{
    AppliedSnapshot, Light, LightOverrides, LightState, LightTarget, MirekRange, Override, Scene,
};
use circadia_domain::schedule::AutoOnWindow;
use circadia_domain::time::{ClockTime, Timestamp};

use crate::error::StorageError;

fn encode_time(at: Timestamp) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(value: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    value
        .map(|s| Timestamp::from_str(&s))
        .transpose()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

fn decode_clock(value: Option<String>) -> Result<Option<ClockTime>, sqlx::Error> {
    value
        .map(|s| ClockTime::from_str(&s))
        .transpose()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

fn state_of(brightness: Option<u8>, mirek: Option<u16>, on: Option<bool>) -> Option<LightState> {
    Some(LightState {
        brightness: brightness?,
        temperature_mirek: mirek?,
        on: on?,
    })
}

fn override_of<T>(value: Option<T>, target: Option<T>, at: Option<Timestamp>) -> Option<Override<T>> {
    Some(Override {
        value: value?,
        target_at_override: target?,
        at: at?,
    })
}

fn not_found(entity: &'static str, id: impl ToString) -> CircadiaError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

/// Wrapper for converting database rows into domain [`Light`].
struct Wrapper(Light);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let zigbee_id: Option<String> = row.try_get("zigbee_id")?;
        let auto_on_from = decode_clock(row.try_get("auto_on_from")?)?;
        let auto_on_to = decode_clock(row.try_get("auto_on_to")?)?;
        let last_update_time = decode_time(row.try_get("last_update_time")?)?;

        let target = state_of(
            row.try_get("target_brightness")?,
            row.try_get("target_mirek")?,
            row.try_get("target_on")?,
        );
        let last_state = state_of(
            row.try_get("last_brightness")?,
            row.try_get("last_mirek")?,
            row.try_get("last_on")?,
        );
        let overrides = LightOverrides {
            on: override_of(
                row.try_get("override_on")?,
                row.try_get("override_on_target")?,
                decode_time(row.try_get("override_on_time")?)?,
            ),
            brightness: override_of(
                row.try_get("override_brightness")?,
                row.try_get("override_brightness_target")?,
                decode_time(row.try_get("override_brightness_time")?)?,
            ),
            colour_temp: override_of(
                row.try_get("override_mirek")?,
                row.try_get("override_mirek_target")?,
                decode_time(row.try_get("override_mirek_time")?)?,
            ),
        };

        Ok(Self(Light {
            id: LightId::new(id),
            zigbee_id: zigbee_id.map(ZigbeeId::new),
            name: row.try_get("name")?,
            schedule_name: row.try_get("schedule_name")?,
            group_name: row.try_get("group_name")?,
            mirek_range: MirekRange::new(row.try_get("mirek_min")?, row.try_get("mirek_max")?),
            auto_on: auto_on_from
                .zip(auto_on_to)
                .map(|(from, to)| AutoOnWindow { from, to }),
            target,
            reachable: row.try_get("reachable")?,
            on: row.try_get("is_on")?,
            overrides,
            last_update: last_update_time
                .zip(last_state)
                .map(|(at, state)| AppliedSnapshot { at, state }),
        }))
    }
}

const UPSERT_LIGHT: &str = "INSERT INTO lights (id, zigbee_id, name, schedule_name, group_name, mirek_min, mirek_max, auto_on_from, auto_on_to, is_on)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
    zigbee_id = excluded.zigbee_id,
    name = excluded.name,
    schedule_name = excluded.schedule_name,
    group_name = excluded.group_name,
    mirek_min = excluded.mirek_min,
    mirek_max = excluded.mirek_max,
    auto_on_from = excluded.auto_on_from,
    auto_on_to = excluded.auto_on_to";
const UPSERT_SCENE: &str = "INSERT INTO scenes (id, name, schedule_name) VALUES (?, ?, ?)
ON CONFLICT (id) DO UPDATE SET name = excluded.name, schedule_name = excluded.schedule_name";
const SELECT_LIGHT_BY_ID: &str = "SELECT * FROM lights WHERE id = ?";
const SELECT_SCENE_TARGET: &str =
    "SELECT target_brightness, target_mirek, target_on FROM scenes WHERE id = ?";
const UPDATE_LIGHT_TARGETS: &str = "UPDATE lights SET target_brightness = ?, target_mirek = ?, target_on = ? WHERE schedule_name = ?";
const UPDATE_SCENE_TARGETS: &str = "UPDATE scenes SET target_brightness = ?, target_mirek = ?, target_on = ? WHERE schedule_name = ?";
const SET_UNREACHABLE: &str = "UPDATE lights SET reachable = 0,
    override_on = NULL, override_on_target = NULL, override_on_time = NULL,
    override_brightness = NULL, override_brightness_target = NULL, override_brightness_time = NULL,
    override_mirek = NULL, override_mirek_target = NULL, override_mirek_time = NULL
WHERE id = ?";
const SET_REACHABLE: &str = "UPDATE lights SET reachable = 1 WHERE id = ?";
const SET_ON_STATE: &str = "UPDATE lights SET is_on = ? WHERE id = ?";
const SET_ON_OVERRIDE: &str = "UPDATE lights SET override_on = ?, override_on_target = ?, override_on_time = ? WHERE id = ?";
const SET_BRIGHTNESS_OVERRIDE: &str = "UPDATE lights SET override_brightness = ?, override_brightness_target = ?, override_brightness_time = ? WHERE id = ?";
const SET_MIREK_OVERRIDE: &str = "UPDATE lights SET override_mirek = ?, override_mirek_target = ?, override_mirek_time = ? WHERE id = ?";
const CLEAR_OVERRIDES: &str = "UPDATE lights SET
    override_on = NULL, override_on_target = NULL, override_on_time = NULL,
    override_brightness = NULL, override_brightness_target = NULL, override_brightness_time = NULL,
    override_mirek = NULL, override_mirek_target = NULL, override_mirek_time = NULL
WHERE id = ?";
const EXISTS_LIGHT: &str = "SELECT EXISTS (SELECT 1 FROM lights WHERE id = ?)";
const SELECT_ID_BY_ZIGBEE_ID: &str = "SELECT id FROM lights WHERE zigbee_id = ? ORDER BY id LIMIT 1";
const SELECT_LAST_UPDATE: &str = "SELECT last_update_time FROM lights WHERE id = ?";
const SELECT_CONTROLLING_IDS: &str = "SELECT id FROM lights
WHERE target_on IS NOT NULL
    AND reachable = 1
    AND COALESCE(override_on_time > ?, 0) = 0
    AND COALESCE(override_brightness_time > ?, 0) = 0
    AND COALESCE(override_mirek_time > ?, 0) = 0
    AND (
        last_update_time IS NULL
        OR last_brightness IS NOT target_brightness
        OR last_mirek IS NOT (CASE
            WHEN mirek_min > 0 AND target_mirek < mirek_min THEN mirek_min
            WHEN mirek_max > 0 AND target_mirek > mirek_max THEN mirek_max
            ELSE target_mirek
        END)
        OR last_on IS NOT target_on
    )
ORDER BY id";
const SELECT_SCENE_IDS: &str = "SELECT id FROM scenes ORDER BY id";
const MARK_UPDATED: &str = "UPDATE lights SET
    last_update_time = ?,
    last_brightness = ?,
    last_mirek = ?,
    last_on = ?,
    is_on = ?,
    reachable = 1,
    override_on = NULL, override_on_target = NULL, override_on_time = NULL,
    override_brightness = NULL, override_brightness_target = NULL, override_brightness_time = NULL,
    override_mirek = NULL, override_mirek_target = NULL, override_mirek_time = NULL
WHERE id = ?";

/// `SQLite`-backed light and scene store.
pub struct SqliteLightStore {
    pool: SqlitePool,
}

impl SqliteLightStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run a single-row light update, failing when the light is unknown.
    fn update_light<'q>(
        &self,
        id: &LightId,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send + 'q {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let result = query
                .bind(id.as_str().to_owned())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                return Err(not_found("Light", id));
            }
            Ok(())
        }
    }
}

impl LightStore for SqliteLightStore {
    fn add_lights(
        &self,
        lights: Vec<Light>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            for light in lights {
                sqlx::query(UPSERT_LIGHT)
                    .bind(light.id.to_string())
                    .bind(light.zigbee_id.map(|id| id.to_string()))
                    .bind(&light.name)
                    .bind(&light.schedule_name)
                    .bind(&light.group_name)
                    .bind(light.mirek_range.min)
                    .bind(light.mirek_range.max)
                    .bind(light.auto_on.map(|w| w.from.to_string()))
                    .bind(light.auto_on.map(|w| w.to.to_string()))
                    .bind(light.on)
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
            }
            tx.commit().await.map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn add_scenes(
        &self,
        scenes: Vec<Scene>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            for scene in scenes {
                sqlx::query(UPSERT_SCENE)
                    .bind(scene.id.to_string())
                    .bind(&scene.name)
                    .bind(&scene.schedule_name)
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
            }
            tx.commit().await.map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn get_light(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<Option<Light>, CircadiaError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_LIGHT_BY_ID)
                .bind(id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn get_light_target_state(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<LightTarget, CircadiaError>> + Send {
        let light = self.get_light(id);
        let id = id.clone();
        async move {
            light
                .await?
                .and_then(|light| light.target_state())
                .ok_or_else(|| not_found("LightTarget", id))
        }
    }

    fn get_scene_target_state(
        &self,
        id: &SceneId,
    ) -> impl Future<Output = Result<LightState, CircadiaError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let row: Option<(Option<u8>, Option<u16>, Option<bool>)> =
                sqlx::query_as(SELECT_SCENE_TARGET)
                    .bind(id.as_str())
                    .fetch_optional(&pool)
                    .await
                    .map_err(StorageError::from)?;

            row.and_then(|(brightness, mirek, on)| state_of(brightness, mirek, on))
                .ok_or_else(|| not_found("SceneTarget", id))
        }
    }

    fn update_target_state(
        &self,
        schedule_name: &str,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let pool = self.pool.clone();
        let schedule_name = schedule_name.to_string();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            for query in [UPDATE_LIGHT_TARGETS, UPDATE_SCENE_TARGETS] {
                sqlx::query(query)
                    .bind(state.brightness)
                    .bind(state.temperature_mirek)
                    .bind(state.on)
                    .bind(&schedule_name)
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
            }
            tx.commit().await.map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn set_light_unreachable(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        self.update_light(id, sqlx::query(SET_UNREACHABLE))
    }

    fn mark_light_reachable(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        self.update_light(id, sqlx::query(SET_REACHABLE))
    }

    fn set_light_on_state(
        &self,
        id: &LightId,
        on: bool,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        self.update_light(id, sqlx::query(SET_ON_STATE).bind(on))
    }

    fn set_light_on_state_override(
        &self,
        id: &LightId,
        value: Override<bool>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let query = sqlx::query(SET_ON_OVERRIDE)
            .bind(value.value)
            .bind(value.target_at_override)
            .bind(encode_time(value.at));
        self.update_light(id, query)
    }

    fn set_light_brightness_override(
        &self,
        id: &LightId,
        value: Override<u8>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let query = sqlx::query(SET_BRIGHTNESS_OVERRIDE)
            .bind(value.value)
            .bind(value.target_at_override)
            .bind(encode_time(value.at));
        self.update_light(id, query)
    }

    fn set_light_colour_temp_override(
        &self,
        id: &LightId,
        value: Override<u16>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let query = sqlx::query(SET_MIREK_OVERRIDE)
            .bind(value.value)
            .bind(value.target_at_override)
            .bind(encode_time(value.at));
        self.update_light(id, query)
    }

    fn clear_light_overrides(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        self.update_light(id, sqlx::query(CLEAR_OVERRIDES))
    }

    fn is_scheduled_light(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<bool, CircadiaError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let exists: bool = sqlx::query_scalar(EXISTS_LIGHT)
                .bind(id)
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(exists)
        }
    }

    fn get_light_service_id_for_zigbee_id(
        &self,
        id: &ZigbeeId,
    ) -> impl Future<Output = Result<Option<LightId>, CircadiaError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let row: Option<String> = sqlx::query_scalar(SELECT_ID_BY_ZIGBEE_ID)
                .bind(id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(row.map(LightId::new))
        }
    }

    fn get_light_last_update(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<Option<Timestamp>, CircadiaError>> + Send {
        let pool = self.pool.clone();
        let id = id.clone();
        async move {
            let row: Option<Option<String>> = sqlx::query_scalar(SELECT_LAST_UPDATE)
                .bind(id.as_str())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;
            let value = row.ok_or_else(|| not_found("Light", &id))?;
            Ok(decode_time(value).map_err(StorageError::from)?)
        }
    }

    fn get_all_controlling_light_ids(
        &self,
        override_cutoff: Timestamp,
    ) -> impl Future<Output = Result<Vec<LightId>, CircadiaError>> + Send {
        let pool = self.pool.clone();
        let cutoff = encode_time(override_cutoff);
        async move {
            let ids: Vec<String> = sqlx::query_scalar(SELECT_CONTROLLING_IDS)
                .bind(&cutoff)
                .bind(&cutoff)
                .bind(&cutoff)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(ids.into_iter().map(LightId::new).collect())
        }
    }

    fn get_all_scene_ids(&self) -> impl Future<Output = Result<Vec<SceneId>, CircadiaError>> + Send {
        let pool = self.pool.clone();
        async move {
            let ids: Vec<String> = sqlx::query_scalar(SELECT_SCENE_IDS)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(ids.into_iter().map(SceneId::new).collect())
        }
    }

    fn mark_light_as_updated(
        &self,
        id: &LightId,
        at: Timestamp,
        applied: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        self.update_light(
            id,
            sqlx::query(MARK_UPDATED)
                .bind(encode_time(at))
                .bind(applied.brightness)
                .bind(applied.temperature_mirek)
                .bind(applied.on)
                .bind(applied.on),
        )
    }
}
