use crate::error::StoreError;
use crate::ipc::error::err;
use crate::store;
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn optional_limit(req: &Request, key: &str, default: usize) -> Result<usize, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => match v.as_u64() {
            Some(n) if (1..=500).contains(&n) => Ok(n as usize),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be an integer in 1..=500", key),
                None,
            )),
        },
    }
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Deserializes `params` (or `params[key]` when given) into a typed input.
pub fn typed_params<T: DeserializeOwned>(req: &Request, key: Option<&str>) -> Result<T, serde_json::Value> {
    let raw = match key {
        Some(k) => req
            .params
            .get(k)
            .cloned()
            .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", k), None))?,
        None => req.params.clone(),
    };
    let raw = if raw.is_null() { json!({}) } else { raw };
    serde_json::from_value(raw).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Student and subject display names keyed by id.
pub fn name_maps(
    conn: &Connection,
) -> Result<(HashMap<String, String>, HashMap<String, String>), StoreError> {
    let students = store::list_students(conn, &Default::default())?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();
    let subjects = store::list_subjects(conn, None)?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();
    Ok((students, subjects))
}
