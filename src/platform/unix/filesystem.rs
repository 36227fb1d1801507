//! Unix filesystem operations

use crate::error::Result;
use crate::platform::traits::FilesystemOps;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub struct UnixFilesystem;

impl UnixFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl FilesystemOps for UnixFilesystem {
    fn is_executable(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }

    fn find_command(&self, command: &str, search_path: Option<&str>) -> Result<Option<PathBuf>> {
        // Anything with a separator is taken as a path, relative or absolute
        if command.contains('/') {
            let path = PathBuf::from(command);
            return Ok(self.is_executable(&path).then_some(path));
        }

        let path_var = match search_path {
            Some(path) => path.to_string(),
            None => std::env::var("PATH").unwrap_or_default(),
        };

        Ok(std::env::split_paths(&path_var)
            .map(|dir| dir.join(command))
            .find(|candidate| self.is_executable(candidate)))
    }
}
