use std::io::{self, BufRead, Write};

use sinad::config::Configuration;
use sinad::ipc;

fn main() -> anyhow::Result<()> {
    let cfg = Configuration::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cfg.log_level))
        .init();

    let mut state = ipc::AppState::in_memory(cfg.seed.rng_seed);
    if let Some(workspace) = cfg.workspace.as_ref() {
        // Keep serving from memory if the configured workspace cannot be opened.
        if let Err(e) = state.open_workspace(workspace) {
            log::error!(
                "failed to open workspace {}: {e:#}",
                workspace.to_string_lossy()
            );
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
                // No id to echo back.
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
    Ok(())
}
