use crate::config;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "cache": state.cache.stats(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "workspace open failed");
            return err(&req.id, "db_open_failed", format!("{e:?}"), None);
        }
    };
    let grading = match config::load_grading_config(&conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    tracing::info!(path = %path.display(), "workspace opened");
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.grading = grading;
    state.cache.clear();
    state.cache.set_capacity(grading.cache_capacity);
    ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_db_info(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(workspace) = state.workspace.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let path = db::db_path(workspace);
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    let mut counts = serde_json::Map::new();
    for (table, key) in [
        ("students", "studentCount"),
        ("subjects", "subjectCount"),
        ("marks", "markCount"),
    ] {
        match db::table_count(conn, table) {
            Ok(n) => {
                counts.insert(key.to_string(), json!(n));
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    ok(
        &req.id,
        json!({
            "databasePath": path.to_string_lossy(),
            "databaseExists": path.is_file(),
            "databaseSize": size,
            "counts": counts,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "db.info" => Some(handle_db_info(state, req)),
        _ => None,
    }
}
