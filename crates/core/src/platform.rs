//! Host platform identity used for binary naming and source selection.

use serde::Serialize;
use std::fmt;

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    MacOs,
    Windows,
    Other,
}

/// CPU architecture relevant for prebuilt binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    Aarch64,
    Other,
}

/// The platform a binary must run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Platform of the running process.
    pub fn current() -> Self {
        let os = if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Other
        };

        let arch = if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else {
            Arch::Other
        };

        Self { os, arch }
    }

    /// Extraction binary file names, most specific first.
    pub fn binary_names(&self) -> &'static [&'static str] {
        match self.os {
            Os::Linux => &["yt-dlp-linux", "yt-dlp_linux", "yt-dlp"],
            Os::MacOs => &["yt-dlp-macos", "yt-dlp_macos", "yt-dlp"],
            Os::Windows => &["yt-dlp.exe"],
            Os::Other => &["yt-dlp"],
        }
    }

    /// File name used when a fetched binary is written to disk.
    pub fn fetched_binary_name(&self) -> &'static str {
        match self.os {
            Os::Windows => "yt-dlp.exe",
            _ => "yt-dlp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = match self.os {
            Os::Linux => "linux",
            Os::MacOs => "macos",
            Os::Windows => "windows",
            Os::Other => "other",
        };
        let arch = match self.arch {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Other => "other",
        };
        write!(f, "{}-{}", os, arch)
    }
}
