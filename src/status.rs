use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::report;

pub const DEFAULT_STATUS_PATH: &str = "site/status.json";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const GENERATED_BY: &str = "site-upkeep status";
pub const NOTE: &str = "Automated site metadata update (scheduled).";

/// The automation run that invoked us, from `GITHUB_*` variables.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    pub actor: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: String,
    pub run_attempt: String,
    pub run_id: String,
    pub sha: String,
    pub workflow: String,
}

impl RunContext {
    pub fn from_env() -> Self {
        let env: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::from_vars(&env)
    }

    pub fn from_vars(env: &HashMap<String, String>) -> Self {
        let get = |key: &str| env.get(key).cloned().unwrap_or_default();
        Self {
            actor: get("GITHUB_ACTOR"),
            git_ref: get("GITHUB_REF"),
            repository: get("GITHUB_REPOSITORY"),
            run_attempt: get("GITHUB_RUN_ATTEMPT"),
            run_id: get("GITHUB_RUN_ID"),
            sha: get("GITHUB_SHA"),
            workflow: get("GITHUB_WORKFLOW"),
        }
    }
}

/// Existing top-level object at `path`, or an empty one.
pub fn read_existing(path: &Path) -> Map<String, Value> {
    let Ok(raw) = fs::read_to_string(path) else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(path = %path.display(), "status file is not an object, starting over");
            Map::new()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "status file is not valid JSON, starting over");
            Map::new()
        }
    }
}

pub fn utc_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// `now` in `tz_name`. Unknown zones fall back to UTC.
pub fn local_timestamp(now: DateTime<Utc>, tz_name: &str) -> String {
    match tz_name.parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).to_rfc3339_opts(SecondsFormat::Secs, false),
        Err(_) => {
            debug!(tz = tz_name, "unknown time zone, using UTC");
            utc_timestamp(now)
        }
    }
}

/// Merges the run fields into `existing`, keeping every other key.
pub fn stamp(mut existing: Map<String, Value>, ctx: &RunContext, tz_name: &str, now: DateTime<Utc>) -> Result<Value> {
    let fields = json!({
        "generatedBy": GENERATED_BY,
        "localTimezone": tz_name,
        "lastRunLocal": local_timestamp(now, tz_name),
        "lastRunUtc": utc_timestamp(now),
        "note": NOTE,
        "run": serde_json::to_value(ctx)?,
    });
    if let Value::Object(fields) = fields {
        existing.extend(fields);
    }
    Ok(report::sort_keys(Value::Object(existing)))
}

pub fn update_status(path: &Path, tz_name: &str) -> Result<Value> {
    let existing = read_existing(path);
    let value = stamp(existing, &RunContext::from_env(), tz_name, Utc::now())?;
    report::write_json(path, &value)?;
    Ok(value)
}
