//! Windows filesystem operations

use crate::error::Result;
use crate::platform::traits::FilesystemOps;
use std::path::{Path, PathBuf};

pub struct WindowsFilesystem;

impl WindowsFilesystem {
    pub fn new() -> Self {
        Self
    }

    fn extensions() -> Vec<String> {
        env_or("PATHEXT", ".COM;.EXE;.BAT;.CMD")
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
            .collect()
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

impl FilesystemOps for WindowsFilesystem {
    fn is_executable(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = format!(".{}", ext.to_ascii_lowercase());
        Self::extensions().contains(&ext)
    }

    fn find_command(&self, command: &str, search_path: Option<&str>) -> Result<Option<PathBuf>> {
        let direct = PathBuf::from(command);
        if direct.components().count() > 1 {
            return Ok(self.is_executable(&direct).then_some(direct));
        }

        let path_var = match search_path {
            Some(path) => path.to_string(),
            None => env_or("PATH", ""),
        };
        let extensions = Self::extensions();

        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(command);
            if self.is_executable(&candidate) {
                return Ok(Some(candidate));
            }
            for ext in &extensions {
                let candidate = dir.join(format!("{}{}", command, ext));
                if candidate.is_file() {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }
}
