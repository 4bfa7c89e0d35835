use std::path::Path;

use code_call_lens::settings::{LensSettings, SETTINGS_SECTION};
use serde_json::Value;

/// Optional settings file at the workspace root.
pub const PROJECT_SETTINGS_FILE: &str = ".code_call_lens.yml";

/// Settings from every source we read them from. Client settings override
/// the project file, which overrides the built-in defaults.
#[derive(Debug, Default)]
pub struct SettingsLayers {
    pub project: Value,
    pub client: Value,
}

impl SettingsLayers {
    pub fn effective(&self) -> Result<LensSettings, String> {
        let mut merged = section(self.project.clone());
        merge_json(&mut merged, section(self.client.clone()));
        match LensSettings::from_value(merged) {
            Err(e) => Err(format!("bad settings: {:?}", e)),
            Ok(settings) => Ok(settings),
        }
    }
}

fn section(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(SETTINGS_SECTION) => {
            map.remove(SETTINGS_SECTION).unwrap_or_default()
        }
        other => other,
    }
}

/// Deep-merges `overlay` into `base`. Nulls in `overlay` leave `base` alone.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (_, Value::Null) => (),
        (base, overlay) => *base = overlay,
    }
}

/// Reads the project settings file under `root`, if there is one.
pub async fn read_project_settings(root: &Path) -> Result<Value, String> {
    let path = root.join(PROJECT_SETTINGS_FILE);
    if !path.exists() {
        return Ok(Value::Null);
    }

    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("couldn't read {}: {}", PROJECT_SETTINGS_FILE, e))?;
    if contents.trim().is_empty() {
        return Ok(Value::Null);
    }
    match serde_yaml::from_str::<Value>(&contents) {
        Err(e) => Err(format!("bad yaml parse: {:?}", e)),
        Ok(value) => Ok(value),
    }
}
