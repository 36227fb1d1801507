//! Windows shell operations

use crate::platform::traits::ShellOps;
use std::env;
use std::path::PathBuf;

pub struct WindowsShell;

impl WindowsShell {
    pub fn new() -> Self {
        Self
    }
}

impl ShellOps for WindowsShell {
    fn default_shell(&self) -> PathBuf {
        match env::var("COMSPEC") {
            Ok(shell) if !shell.trim().is_empty() => PathBuf::from(shell),
            _ => PathBuf::from("cmd.exe"),
        }
    }
}
