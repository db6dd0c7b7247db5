//! `UPTIME_*` environment overrides shared by the config loaders.

use std::env;

/// Trimmed value of `key`; unset and blank both read as absent.
pub(crate) fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

/// Parsed value of `key`; unparseable input reads as absent so the caller keeps its default.
pub(crate) fn env_parsed<T>(key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    env_value(key).and_then(|raw| parse(&raw))
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Runs `f` with `vars` applied, restoring the previous values afterwards.
/// Every env-reading test in the crate goes through this so they never race.
#[cfg(test)]
pub(crate) fn with_env_vars<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let previous: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| (key.to_string(), env::var(key).ok()))
        .collect();
    let apply = |key: &str, value: Option<&str>| match value {
        Some(v) => env::set_var(key, v),
        None => env::remove_var(key),
    };

    for (key, value) in vars {
        apply(*key, *value);
    }
    let output = f();
    for (key, value) in &previous {
        apply(key.as_str(), value.as_deref());
    }

    output
}
