use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Serialize;

use crate::{
    cli::Args,
    core::{
        config::GridConfig,
        connection::{ConnectionManager, WorkerHandle},
        limits::effective_page_size,
        types::{GridEnvelope, GridRequest},
    },
    error::{AppError, AppResult},
};

use super::protocol::*;

pub struct BridgeHandler {
    config: Arc<GridConfig>,
    allowed_dirs: Vec<PathBuf>,
    cm: ConnectionManager,
    active_db: Option<PathBuf>,
}

impl BridgeHandler {
    pub fn new(args: &Args, config: GridConfig) -> Self {
        let config = Arc::new(config);
        Self {
            cm: ConnectionManager::new(Arc::clone(&config), Duration::from_millis(args.timeout_ms)),
            config,
            allowed_dirs: args.allowed_dir.clone(),
            active_db: None,
        }
    }

    pub async fn handle(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        if req.v != PROTOCOL_VERSION {
            return BridgeResponse::err(
                req.v,
                req.id,
                "INVALID_REQUEST",
                format!("unsupported protocol version: {}", req.v),
            );
        }

        match req.cmd.as_str() {
            "connect" => self.handle_connect(req).await,
            "grid" => self.handle_grid(req).await,
            "tables" => self.handle_tables(req).await,
            "describe" => self.handle_describe(req).await,
            "table_exists" => self.handle_table_exists(req).await,
            "foreign_key" => self.handle_foreign_key(req).await,
            "record" => self.handle_record(req).await,
            other => BridgeResponse::err(
                req.v,
                req.id,
                "INVALID_REQUEST",
                format!("unknown cmd: {other}"),
            ),
        }
    }

    async fn handle_connect(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        let p: ConnectPayload = match parse_payload(&req) {
            Ok(v) => v,
            Err(e) => return err(req, e),
        };
        let res = validate_db_path(Path::new(&p.path), &self.allowed_dirs)
            .and_then(|path| self.cm.ensure_worker(&path));
        match res {
            Ok(worker) => {
                self.active_db = Some(worker.db_path.clone());
                ok(req, serde_json::Value::Bool(true))
            }
            Err(e) => err(req, e),
        }
    }

    async fn handle_grid(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        let p: GridPayload = match parse_payload(&req) {
            Ok(v) => v,
            Err(e) => return err(req, e),
        };
        let worker = match self.worker_for(p.path.clone()) {
            Ok(w) => w,
            Err(e) => return grid_err(req, e),
        };

        let limits = effective_page_size(p.page_size, self.config.default_page_size, self.config.max_page_size);
        let mut grid_req = GridRequest::new(p.table);
        grid_req.page = p.page.unwrap_or(1);
        grid_req.page_size = limits.page_size;
        grid_req.search_term = p.search_term.unwrap_or_default();
        grid_req.search_column = p.search_column;
        grid_req.sort_field = p.sort_field.unwrap_or_default();
        if let Some(dir) = p.sort_direction {
            grid_req.sort_direction = dir;
        }

        match worker.grid(grid_req).await {
            Ok(g) => respond(req, GridEnvelope::ok(g)),
            Err(e) => grid_err(req, e),
        }
    }

    async fn handle_tables(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        let p: TablesPayload = match parse_payload(&req) {
            Ok(v) => v,
            Err(e) => return err(req, e),
        };
        match self.worker_for(p.path) {
            Ok(w) => match w.tables().await {
                Ok(v) => respond(req, v),
                Err(e) => err(req, e),
            },
            Err(e) => err(req, e),
        }
    }

    async fn handle_describe(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        let p: TablePayload = match parse_payload(&req) {
            Ok(v) => v,
            Err(e) => return err(req, e),
        };
        match self.worker_for(p.path) {
            Ok(w) => match w.describe(p.table).await {
                Ok(v) => respond(req, v),
                Err(e) => err(req, e),
            },
            Err(e) => err(req, e),
        }
    }

    async fn handle_table_exists(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        let p: TablePayload = match parse_payload(&req) {
            Ok(v) => v,
            Err(e) => return err(req, e),
        };
        match self.worker_for(p.path) {
            Ok(w) => match w.table_exists(p.table).await {
                Ok(v) => respond(req, v),
                Err(e) => err(req, e),
            },
            Err(e) => err(req, e),
        }
    }

    async fn handle_foreign_key(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        let p: ColumnPayload = match parse_payload(&req) {
            Ok(v) => v,
            Err(e) => return err(req, e),
        };
        match self.worker_for(p.path) {
            Ok(w) => match w.foreign_key(p.table, p.column).await {
                Ok(v) => respond(req, v),
                Err(e) => err(req, e),
            },
            Err(e) => err(req, e),
        }
    }

    async fn handle_record(&mut self, req: BridgeRequest) -> BridgeResponse<serde_json::Value> {
        let p: RecordPayload = match parse_payload(&req) {
            Ok(v) => v,
            Err(e) => return err(req, e),
        };
        match self.worker_for(p.path) {
            Ok(w) => match w.record(p.table, p.id).await {
                Ok(v) => respond(req, v),
                Err(e) => err(req, e),
            },
            Err(e) => err(req, e),
        }
    }

    fn worker_for(&self, payload_path: Option<String>) -> AppResult<WorkerHandle> {
        let path = match payload_path {
            Some(p) => validate_db_path(Path::new(&p), &self.allowed_dirs)?,
            None => self
                .active_db
                .clone()
                .ok_or_else(|| AppError::InvalidRequest("no active db; call connect first or pass path".into()))?,
        };
        self.cm.ensure_worker(&path)
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(req: &BridgeRequest) -> AppResult<T> {
    serde_json::from_value(req.payload.clone()).map_err(|e| AppError::InvalidRequest(e.to_string()))
}

fn respond<T: Serialize>(req: BridgeRequest, data: T) -> BridgeResponse<serde_json::Value> {
    match serde_json::to_value(data) {
        Ok(v) => ok(req, v),
        Err(e) => err(req, e.into()),
    }
}

fn ok(req: BridgeRequest, data: serde_json::Value) -> BridgeResponse<serde_json::Value> {
    BridgeResponse::ok(req.v, req.id, data)
}

fn err(req: BridgeRequest, e: AppError) -> BridgeResponse<serde_json::Value> {
    if e.is_client_error() {
        tracing::debug!(cmd = %req.cmd, code = e.code(), error = %e, "request rejected");
    } else {
        tracing::warn!(cmd = %req.cmd, code = e.code(), error = %e, "request failed");
    }
    BridgeResponse::err(req.v, req.id, e.code(), e.to_string())
}

/// Grid failures also carry the `{success: false, message}` shape in `details`.
fn grid_err(req: BridgeRequest, e: AppError) -> BridgeResponse<serde_json::Value> {
    let details = serde_json::to_value(GridEnvelope::failed(e.to_string())).unwrap_or_default();
    err(req, e).with_details(details)
}

fn validate_db_path(db_path: &Path, allowed_dirs: &[PathBuf]) -> AppResult<PathBuf> {
    let abs = if db_path.is_absolute() {
        db_path.to_path_buf()
    } else {
        std::env::current_dir()?.join(db_path)
    };
    let abs = normalize_lexical(&abs);

    if allowed_dirs.is_empty() || allowed_dirs.iter().any(|d| abs.starts_with(normalize_lexical(d))) {
        return Ok(abs);
    }
    Err(AppError::PathNotAllowed(abs))
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize_lexical(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(comp.as_os_str()),
            Component::Normal(c) => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn dot_dot_cannot_escape_allowed_dir() {
        let allowed = [PathBuf::from("/data/dbs")];
        assert!(validate_db_path(Path::new("/data/dbs/app.db"), &allowed).is_ok());
        assert!(matches!(
            validate_db_path(Path::new("/data/dbs/../secret/app.db"), &allowed),
            Err(AppError::PathNotAllowed(p)) if p == Path::new("/data/secret/app.db")
        ));
        assert!(validate_db_path(Path::new("/anywhere.db"), &[]).is_ok());
    }

    fn handler() -> BridgeHandler {
        let args = Args::parse_from(["sqlite-grid"]);
        BridgeHandler::new(&args, GridConfig::default())
    }

    fn request(cmd: &str, payload: serde_json::Value) -> BridgeRequest {
        BridgeRequest {
            v: 1,
            id: "1".into(),
            cmd: cmd.into(),
            payload,
        }
    }

    #[tokio::test]
    async fn grid_without_connection_reports_failure_details() {
        let mut h = handler();
        let resp = h.handle(request("grid", serde_json::json!({ "table": "Users" }))).await;
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(resp.code, Some("INVALID_REQUEST"));
        let details = resp.details.unwrap();
        assert_eq!(details["success"], false);
        assert!(details["message"].as_str().unwrap().contains("no active db"));
    }

    #[tokio::test]
    async fn unknown_command_and_version_are_rejected() {
        let mut h = handler();
        let resp = h.handle(request("drop", serde_json::Value::Null)).await;
        assert_eq!(resp.code, Some("INVALID_REQUEST"));

        let mut req = request("tables", serde_json::json!({}));
        req.v = 2;
        let resp = h.handle(req).await;
        assert_eq!(resp.status, ResponseStatus::Error);
    }

    #[tokio::test]
    async fn malformed_payload_is_invalid_request() {
        let mut h = handler();
        let resp = h.handle(request("record", serde_json::json!({ "table": "Users" }))).await;
        assert_eq!(resp.code, Some("INVALID_REQUEST"));
    }
}
