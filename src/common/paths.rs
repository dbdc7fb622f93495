use std::path::PathBuf;

// Fixed system locations used when no config path is given and dev mode is off.

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/facevote/facevote.toml")
}

pub fn system_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/facevote")
}

pub fn system_models_dir() -> PathBuf {
    PathBuf::from("/usr/share/facevote/models")
}
