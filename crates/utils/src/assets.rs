use std::{env, path::PathBuf};

use directories::ProjectDirs;

const DATA_DIR_ENV: &str = "JELLYNOUNCER_DATA_DIR";

/// Directory the service persists its sqlite database and any on-disk
/// template overrides to. `JELLYNOUNCER_DATA_DIR` overrides the OS default
/// (`~/.local/share/jellynouncer` on Linux, matching XDG conventions).
pub fn data_dir() -> PathBuf {
    let path = if let Ok(custom_dir) = env::var(DATA_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else {
        ProjectDirs::from("", "", "jellynouncer")
            .expect("OS didn't give us a home directory")
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).expect("failed to create data directory");
    }

    path
}

pub fn template_dir() -> PathBuf {
    let path = data_dir().join("templates");
    if !path.exists() {
        std::fs::create_dir_all(&path).expect("failed to create template directory");
    }
    path
}
