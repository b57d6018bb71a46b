use std::path::PathBuf;

const CONFIG_PATH: &str = "ACTIVITY_MONITOR_CONFIG";

/// Config file path from the environment, if set
pub fn get_config_path() -> Option<PathBuf> {
    let path_from_env = std::env::var(CONFIG_PATH);
    path_from_env
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}
