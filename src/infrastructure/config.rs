use crate::domain::temporal::DisplayStyle;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

const APP_JSON: &str = "app.json";
const REMOTE_JSON: &str = "remote.json";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

const ENV_BASE_URL: &[&str] = &["CALENDAR_STORE_BASE_URL"];
const ENV_TOKEN: &[&str] = &["CALENDAR_STORE_TOKEN"];
const ENV_OWNER_ID: &[&str] = &["CALENDAR_OWNER_ID"];
const ENV_TIMEZONE: &[&str] = &["CALENDAR_TIMEZONE"];

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub external_events_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerConfig {
    pub time_zone: Tz,
    pub owner_id: Option<String>,
    pub display_style: DisplayStyle,
    pub remote: RemoteConfig,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "timezone": "UTC",
                "ownerId": null,
                "displayStyle": "long"
            }),
        ),
        (
            REMOTE_JSON,
            serde_json::json!({
                "schema": 1,
                "baseUrl": "http://127.0.0.1:8000/api",
                "timeoutSeconds": DEFAULT_TIMEOUT_SECONDS,
                "externalEventsPath": null
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_config(config_dir: &Path) -> Result<ReconcilerConfig, InfraError> {
    load_config_with_lookup(config_dir, |key| std::env::var(key).ok())
}

/// Reads the config files; values found through `lookup` take precedence.
pub fn load_config_with_lookup<F>(config_dir: &Path, lookup: F) -> Result<ReconcilerConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let app = read_config(&config_dir.join(APP_JSON))?;
    let remote = read_config(&config_dir.join(REMOTE_JSON))?;

    let time_zone_name = optional_lookup_value(&lookup, ENV_TIMEZONE)
        .or_else(|| string_field(&app, "timezone"))
        .unwrap_or_else(|| "UTC".to_string());
    let time_zone = parse_time_zone(&time_zone_name)?;

    let owner_id =
        optional_lookup_value(&lookup, ENV_OWNER_ID).or_else(|| string_field(&app, "ownerId"));

    let display_style = match string_field(&app, "displayStyle").as_deref() {
        None | Some("long") => DisplayStyle::Long,
        Some("compact") => DisplayStyle::Compact,
        Some(other) => {
            return Err(InfraError::InvalidConfig(format!(
                "unsupported displayStyle '{other}' (expected long or compact)"
            )));
        }
    };

    let base_url = optional_lookup_value(&lookup, ENV_BASE_URL)
        .or_else(|| string_field(&remote, "baseUrl"))
        .ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "missing calendar store url (set baseUrl in {REMOTE_JSON} or {})",
                ENV_BASE_URL.join(", ")
            ))
        })?;
    let timeout_seconds = remote
        .get("timeoutSeconds")
        .and_then(serde_json::Value::as_u64)
        .filter(|seconds| *seconds > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

    Ok(ReconcilerConfig {
        time_zone,
        owner_id,
        display_style,
        remote: RemoteConfig {
            base_url,
            access_token: optional_lookup_value(&lookup, ENV_TOKEN),
            timeout: Duration::from_secs(timeout_seconds),
            external_events_path: string_field(&remote, "externalEventsPath"),
        },
    })
}

pub fn parse_time_zone(value: &str) -> Result<Tz, InfraError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("unknown timezone '{value}': {error}")))
}

fn string_field(config: &serde_json::Value, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
