//! Platform detection and path placeholders

use std::fmt;
use std::path::PathBuf;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Windows
    Windows,
    /// Linux
    Linux,
    /// macOS
    MacOs,
}

/// CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    /// `x86_64`
    X64,
    /// `aarch64`
    Arm64,
    /// 32-bit ARM
    Arm,
}

/// OS + architecture pair used to select downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Operating system
    pub os: Os,
    /// Architecture
    pub arch: Arch,
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        let os = if cfg!(windows) {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else {
            Os::Linux
        };
        let arch = if cfg!(target_arch = "aarch64") {
            Arch::Arm64
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else {
            Arch::X64
        };
        Self { os, arch }
    }

    /// Catalog key, e.g. `linux-arm64`
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = match self.os {
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::MacOs => "macos",
        };
        let arch = match self.arch {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
            Arch::Arm => "arm",
        };
        write!(f, "{os}-{arch}")
    }
}

/// Expand `{home}` and `{localdata}` in a catalog path
pub fn expand_path(template: &str) -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let local = dirs::data_local_dir().unwrap_or_else(|| home.clone());
    PathBuf::from(
        template
            .replace("{home}", &home.to_string_lossy())
            .replace("{localdata}", &local.to_string_lossy()),
    )
}

/// File name component of a URL, without query or fragment
pub fn url_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|s| !s.is_empty())
}
