//! Account store inspection probe.
//!
//! # Responsibility
//! - Verify `chatsocket_core` linkage.
//! - Open an existing store file and print an account summary.
//!
//! Usage: `chatsocket_cli [STORE_FILE]`
//!
//! Store logs go to `$CHATSOCKET_LOG_DIR`, or `logs/` beside the store file.

use chatsocket_core::{default_log_level, init_logging, AccountStorage, JsonAccountStore};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "CHATSOCKET_LOG_DIR";

fn main() -> ExitCode {
    println!("chatsocket_core ping={}", chatsocket_core::ping());
    println!("chatsocket_core version={}", chatsocket_core::core_version());

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("error: cannot resolve working directory: {err}");
            return ExitCode::FAILURE;
        }
    };
    let log_dir = resolve_log_dir(&cwd, Path::new(&path), std::env::var_os(LOG_DIR_ENV));
    // Logging is best-effort; the summary still prints without it.
    if let Err(err) = init_logging(default_log_level(), &log_dir.to_string_lossy()) {
        eprintln!("warning: logging disabled: {err}");
    }

    let store = match JsonAccountStore::open(&path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let accounts = store.find_all();
    println!("store={} accounts={}", store.path().display(), accounts.len());
    for account in &accounts {
        println!(
            "  id={} username={} display_name={:?} status={:?}",
            account.id, account.username, account.detail.display_name, account.detail.status
        );
    }
    ExitCode::SUCCESS
}

/// Picks an absolute log directory for `store_path`.
fn resolve_log_dir(
    cwd: &Path,
    store_path: &Path,
    env_override: Option<std::ffi::OsString>,
) -> PathBuf {
    if let Some(dir) = env_override.filter(|dir| !dir.is_empty()) {
        return cwd.join(dir);
    }
    let store_path = cwd.join(store_path);
    store_path.parent().unwrap_or(cwd).join("logs")
}
