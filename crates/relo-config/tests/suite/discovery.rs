use std::ffi::OsString;
use std::sync::Mutex;

use relo_config::{
    discover_config_path, load_for_workspace, with_config_env_lock, ConflictPolicy,
    RELO_CONFIG_ENV_VAR,
};
use tempfile::tempdir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

struct EnvVarGuard {
    key: &'static str,
    prev: Option<OsString>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: &std::path::Path) -> Self {
        let prev = std::env::var_os(key);
        std::env::set_var(key, value);
        Self { key, prev }
    }

    fn unset(key: &'static str) -> Self {
        let prev = std::env::var_os(key);
        std::env::remove_var(key);
        Self { key, prev }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(value) => std::env::set_var(self.key, value),
            None => std::env::remove_var(self.key),
        }
    }
}

#[test]
fn discovers_relo_toml_in_workspace_root() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");
    let _env = EnvVarGuard::unset(RELO_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("relo.toml");
    std::fs::write(&config_path, "[move]\nconflict_policy = \"proceed\"\n").unwrap();

    let discovered = discover_config_path(dir.path()).expect("relo.toml is discovered");
    assert_eq!(discovered, config_path.canonicalize().unwrap_or(config_path));

    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert!(path.is_some());
    assert_eq!(config.r#move.conflict_policy, ConflictPolicy::Proceed);
}

#[test]
fn env_override_wins_over_workspace_file() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("relo.toml"), "[logging]\nlevel = \"info\"\n").unwrap();
    let override_path = dir.path().join("override.toml");
    std::fs::write(&override_path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let (config, path) = with_config_env_lock(|| {
        let _env = EnvVarGuard::set(RELO_CONFIG_ENV_VAR, &override_path);
        load_for_workspace(dir.path()).unwrap()
    });
    assert_eq!(
        path,
        Some(override_path.canonicalize().unwrap_or(override_path.clone()))
    );
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn missing_config_yields_defaults() {
    let _lock = ENV_LOCK.lock().expect("ENV_LOCK mutex poisoned");
    let _env = EnvVarGuard::unset(RELO_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert_eq!(path, None);
    assert_eq!(config, relo_config::ReloConfig::default());
}
