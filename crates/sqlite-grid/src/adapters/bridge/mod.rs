mod handler;
mod io;
mod protocol;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::{
    cli::Args,
    core::config::GridConfig,
    error::{AppError, AppResult},
};

use handler::BridgeHandler;
use io::NdjsonIo;
use protocol::{BridgeRequest, PROTOCOL_VERSION};

pub fn run(args: Args, config: GridConfig) -> AppResult<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    rt.block_on(async move {
        let mut io = NdjsonIo::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
        let mut handler = BridgeHandler::new(&args, config);
        serve(&mut io, &mut handler).await
    })
}

/// Answers requests line by line until EOF.
async fn serve<R, W>(io: &mut NdjsonIo<R, W>, handler: &mut BridgeHandler) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(line) = io.read_line().await? else { break };
        if line.is_empty() {
            continue;
        }

        let req: BridgeRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                // no request id to echo; the client matches on the empty id
                let _ = io.protocol_error(String::new(), PROTOCOL_VERSION, e.to_string()).await;
                continue;
            }
        };

        let resp = handler.handle(req).await;
        io.write_json_line(&resp).await?;
    }

    tracing::debug!("stdin closed; bridge exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    use clap::Parser;
    use serde_json::{json, Value};

    use super::*;

    struct TempDb(PathBuf);

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn temp_db() -> TempDb {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let path = std::env::temp_dir().join(format!("sqlite-grid-bridge-{}-{nanos}.db", std::process::id()));
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = OFF;
             CREATE TABLE Users (Id_Users INTEGER PRIMARY KEY, Username TEXT, Tier INTEGER);
             INSERT INTO Users VALUES (1, 'ana', 1), (2, 'bo', 2), (3, 'cy', 3);
             CREATE TABLE Bans (Id_Bans INTEGER PRIMARY KEY, UserId INTEGER REFERENCES Users, Reason TEXT);
             INSERT INTO Bans VALUES (1, 3, 'spam'), (2, 42, 'ghost');",
        )
        .unwrap();
        TempDb(path)
    }

    async fn exchange(lines: Vec<Value>) -> Vec<Value> {
        let mut input = String::new();
        for l in lines {
            input.push_str(&l.to_string());
            input.push('\n');
        }
        input.push_str("not json\n\n");

        let args = Args::parse_from(["sqlite-grid", "--max-page-size", "2"]);
        let mut handler = BridgeHandler::new(&args, GridConfig::from_args(&args).unwrap());
        let mut io = NdjsonIo::new(input.as_bytes(), Vec::new());
        serve(&mut io, &mut handler).await.unwrap();

        String::from_utf8(io.into_writer())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn end_to_end_grid_session() {
        let db = temp_db();
        let path = db.0.to_string_lossy().to_string();
        let out = exchange(vec![
            json!({ "v": 1, "id": "c", "cmd": "connect", "payload": { "path": path } }),
            json!({ "v": 1, "id": "g", "cmd": "grid", "payload": {
                "table": "Users", "pageSize": 50, "sortField": "Username", "sortDirection": "DESC"
            }}),
            json!({ "v": 1, "id": "b", "cmd": "grid", "payload": { "table": "Bans" } }),
            json!({ "v": 1, "id": "x", "cmd": "grid", "payload": { "table": "Users; DROP TABLE Users" } }),
            json!({ "v": 1, "id": "e", "cmd": "table_exists", "payload": { "table": "Bans" } }),
            json!({ "v": 1, "id": "r", "cmd": "record", "payload": { "table": "Users", "id": 2 } }),
            json!({ "v": 1, "id": "f", "cmd": "foreign_key", "payload": { "table": "Bans", "column": "UserId" } }),
        ])
        .await;

        assert_eq!(out.len(), 8);
        assert_eq!(out[0]["data"], true);

        let g = &out[1]["data"];
        assert_eq!(g["success"], true);
        assert_eq!(g["pageSize"], 2);
        assert_eq!(g["totalPages"], 2);
        assert_eq!(g["sortDirection"], "desc");
        assert_eq!(g["items"][0]["values"]["Username"], "cy");

        let bans = &out[2]["data"]["items"];
        assert_eq!(bans[0]["values"]["UserId"], "cy");
        assert_eq!(bans[1]["values"]["UserId"], "42");

        assert_eq!(out[3]["status"], "error");
        assert_eq!(out[3]["code"], "INVALID_IDENTIFIER");
        assert_eq!(out[3]["details"]["success"], false);

        assert_eq!(out[4]["data"], true);
        assert_eq!(out[5]["data"]["Username"], "bo");
        assert_eq!(out[6]["data"]["isForeignKey"], true);
        assert_eq!(out[6]["data"]["foreignTable"], "Users");
        assert_eq!(out[6]["data"]["foreignColumn"], "Id_Users");
        assert_eq!(out[7]["status"], "error");
        assert_eq!(out[7]["id"], "");
    }
}
