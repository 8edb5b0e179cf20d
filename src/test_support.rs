//! Helpers shared by unit tests.

use std::env;
use std::sync::{Mutex, OnceLock};

/// Serializes tests that mutate process environment variables.
fn env_lock() -> &'static Mutex<()> {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

/// Runs `f` with the given variables set (`Some`) or removed (`None`), then
/// restores their previous values.
pub(crate) fn with_env_vars<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
    let _guard = env_lock().lock().expect("env lock should not be poisoned");
    let previous: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| ((*key).to_string(), env::var(key).ok()))
        .collect();

    for (key, value) in vars {
        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    let output = f();

    for (key, value) in previous {
        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    output
}
