//! Windows-specific platform implementations

mod filesystem;
mod paths;
mod shell;
mod signals;

pub use filesystem::WindowsFilesystem;
pub use paths::WindowsPaths;
pub use shell::WindowsShell;
pub use signals::WindowsSignals;
