use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use rusqlite::{Connection, InterruptHandle, OpenFlags};
use tokio::sync::oneshot;

use crate::{
    core::{
        config::GridConfig,
        executor::RecordLookup,
        foreign::SqlRecordLookup,
        grid,
        identifier::Identifier,
        schema::SchemaIntrospector,
        types::{ForeignKeyInfo, GridRequest, GridResult, Record, TableSchema},
    },
    error::{AppError, AppResult},
};

/// One worker thread (and one read-only connection) per database file.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Mutex<HashMap<PathBuf, WorkerHandle>>>,
    config: Arc<GridConfig>,
    busy_timeout_ms: u64,
    request_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(config: Arc<GridConfig>, request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            config,
            busy_timeout_ms: 2_000,
            request_timeout,
        }
    }

    pub fn ensure_worker(&self, db_path: &Path) -> AppResult<WorkerHandle> {
        let db_path = canonicalize_lossy(db_path)?;
        let mut guard = self.inner.lock().map_err(|_| AppError::Internal("poisoned lock".into()))?;
        if let Some(h) = guard.get(&db_path) {
            return Ok(h.clone());
        }

        let h = WorkerHandle::spawn(
            db_path.clone(),
            self.busy_timeout_ms,
            self.request_timeout,
            Arc::clone(&self.config),
        )
        .inspect_err(|e| tracing::error!(path = %db_path.display(), error = %e, "failed to start db worker"))?;
        guard.insert(db_path, h.clone());
        Ok(h)
    }
}

#[derive(Clone)]
pub struct WorkerHandle {
    tx: std::sync::mpsc::Sender<DbTask>,
    interrupt: Arc<InterruptHandle>,
    request_timeout: Duration,
    pub db_path: PathBuf,
}

impl WorkerHandle {
    fn spawn(
        db_path: PathBuf,
        busy_timeout_ms: u64,
        request_timeout: Duration,
        config: Arc<GridConfig>,
    ) -> AppResult<Self> {
        let conn = open_conn(&db_path, busy_timeout_ms)?;
        let interrupt = Arc::new(conn.get_interrupt_handle());
        let (tx, rx) = std::sync::mpsc::channel::<DbTask>();
        thread::Builder::new()
            .name("sqlite-grid-db".into())
            .spawn(move || db_worker_main(conn, config, rx))?;
        tracing::info!(path = %db_path.display(), "db worker started");
        Ok(Self {
            tx,
            interrupt,
            request_timeout,
            db_path,
        })
    }

    pub async fn grid(&self, request: GridRequest) -> AppResult<GridResult> {
        self.call(|respond_to| DbTask::Grid { request, respond_to }).await
    }

    pub async fn tables(&self) -> AppResult<Vec<String>> {
        self.call(|respond_to| DbTask::Tables { respond_to }).await
    }

    pub async fn describe(&self, table: String) -> AppResult<TableSchema> {
        self.call(|respond_to| DbTask::Describe { table, respond_to }).await
    }

    pub async fn table_exists(&self, table: String) -> AppResult<bool> {
        self.call(|respond_to| DbTask::TableExists { table, respond_to }).await
    }

    pub async fn foreign_key(&self, table: String, column: String) -> AppResult<ForeignKeyInfo> {
        self.call(|respond_to| DbTask::ForeignKey {
            table,
            column,
            respond_to,
        })
        .await
    }

    pub async fn record(&self, table: String, id: i64) -> AppResult<Option<Record>> {
        self.call(|respond_to| DbTask::Record {
            table,
            id,
            respond_to,
        })
        .await
    }

    /// Sends one task and waits for its answer. When the request timeout expires the
    /// running statement is interrupted, so the worker abandons it instead of
    /// producing a late partial answer.
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<AppResult<T>>) -> DbTask,
    ) -> AppResult<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .map_err(|_| AppError::Internal("db worker unavailable".into()))?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(res) => res.map_err(|_| AppError::Internal("db worker dropped response".into()))?,
            Err(_) => {
                tracing::warn!(
                    path = %self.db_path.display(),
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "request timed out; interrupting statement"
                );
                self.interrupt.interrupt();
                Err(AppError::Timeout)
            }
        }
    }
}

enum DbTask {
    Grid {
        request: GridRequest,
        respond_to: oneshot::Sender<AppResult<GridResult>>,
    },
    Tables {
        respond_to: oneshot::Sender<AppResult<Vec<String>>>,
    },
    Describe {
        table: String,
        respond_to: oneshot::Sender<AppResult<TableSchema>>,
    },
    TableExists {
        table: String,
        respond_to: oneshot::Sender<AppResult<bool>>,
    },
    ForeignKey {
        table: String,
        column: String,
        respond_to: oneshot::Sender<AppResult<ForeignKeyInfo>>,
    },
    Record {
        table: String,
        id: i64,
        respond_to: oneshot::Sender<AppResult<Option<Record>>>,
    },
}

fn db_worker_main(conn: Connection, config: Arc<GridConfig>, rx: std::sync::mpsc::Receiver<DbTask>) {
    let prefix = config.pk_prefix.as_str();
    let introspector = SchemaIntrospector::new(&conn, prefix);

    while let Ok(task) = rx.recv() {
        match task {
            DbTask::Grid { request, respond_to } => {
                let res = grid::get_grid_data(&conn, &config, &request);
                if let Err(e) = &res {
                    tracing::debug!(table = %request.table_name, error = %e, "grid request failed");
                }
                let _ = respond_to.send(res);
            }
            DbTask::Tables { respond_to } => {
                let _ = respond_to.send(introspector.list_tables());
            }
            DbTask::Describe { table, respond_to } => {
                let res = Identifier::parse(&table).and_then(|t| introspector.describe(&t));
                let _ = respond_to.send(res);
            }
            DbTask::TableExists { table, respond_to } => {
                let res = Identifier::parse(&table).and_then(|t| introspector.table_exists(&t));
                let _ = respond_to.send(res);
            }
            DbTask::ForeignKey {
                table,
                column,
                respond_to,
            } => {
                let res = Identifier::parse(&table).and_then(|t| {
                    let c = Identifier::parse(&column)?;
                    introspector.foreign_key_info(&t, &c)
                });
                let _ = respond_to.send(res);
            }
            DbTask::Record {
                table,
                id,
                respond_to,
            } => {
                let res = Identifier::parse(&table)
                    .and_then(|t| SqlRecordLookup::new(&conn, prefix).record_by_primary_key(&t, id));
                let _ = respond_to.send(res);
            }
        }
    }
    tracing::debug!("db worker exiting");
}

fn open_conn(path: &Path, busy_timeout_ms: u64) -> AppResult<Connection> {
    // The grid never writes; a missing file is an error rather than a fresh empty database.
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags).map_err(|source| AppError::DbOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let _ = conn.busy_timeout(Duration::from_millis(busy_timeout_ms));
    Ok(conn)
}

fn canonicalize_lossy(path: &Path) -> AppResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = std::env::current_dir()?;
        Ok(cwd.join(path))
    }
}
