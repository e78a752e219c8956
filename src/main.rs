mod config;
mod db;
mod enroll;
mod error;
mod gwa;
mod ipc;
mod logging;
mod migrate;
mod model;
mod store;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
    logging::init();

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };

    if let Some(path) = std::env::var_os(config::WORKSPACE_ENV) {
        let path = PathBuf::from(path);
        match state.open_workspace(path.clone()) {
            Ok(()) => tracing::info!(workspace = %path.display(), "workspace opened from environment"),
            Err(e) => tracing::error!(workspace = %path.display(), error = ?e, "failed to open workspace"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "bad request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
