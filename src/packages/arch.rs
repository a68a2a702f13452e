// src/packages/arch.rs

//! Architecture compatibility
//!
//! Decides which package architectures can be installed on a base
//! architecture and how strongly each one is preferred.

use std::env;

/// Architectures that describe sources rather than installable binaries
const SOURCE_ARCHES: &[&str] = &["src", "nosrc"];

/// Map the host architecture to the RPM base architecture
pub fn detect_architecture() -> String {
    match env::consts::ARCH {
        "x86" => "i686".to_string(),
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le".to_string(),
        "arm" => "armv7hl".to_string(),
        other => other.to_string(),
    }
}

/// Installable architectures for a base arch, most preferred first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchPolicy {
    compatible: Vec<String>,
}

impl ArchPolicy {
    pub fn new(base_arch: &str) -> Self {
        let multilib: &[&str] = match base_arch {
            "x86_64" => &["athlon", "i686", "i586", "i486", "i386"],
            "i686" => &["i586", "i486", "i386"],
            "armv7hl" => &["armv7l", "armv6l", "armv5tel"],
            "ppc64" => &["ppc"],
            "s390x" => &["s390"],
            _ => &[],
        };

        let mut compatible = vec![base_arch.to_string(), "noarch".to_string()];
        compatible.extend(multilib.iter().map(|a| a.to_string()));
        Self { compatible }
    }

    /// The base architecture
    pub fn base(&self) -> &str {
        &self.compatible[0]
    }

    /// Whether packages of `arch` may be installed
    pub fn is_installable(&self, arch: &str) -> bool {
        !SOURCE_ARCHES.contains(&arch) && self.compatible.iter().any(|a| a == arch)
    }

    /// Preference score, lower is better (native 0, noarch 1, multilib after)
    pub fn score(&self, arch: &str) -> usize {
        self.compatible
            .iter()
            .position(|a| a == arch)
            .unwrap_or(self.compatible.len())
    }

    /// Score relative to a requiring package: same arch first, then noarch
    pub fn score_for(&self, arch: &str, requirer_arch: &str) -> usize {
        if arch == requirer_arch {
            0
        } else if arch == "noarch" {
            1
        } else {
            2 + self.score(arch)
        }
    }

    /// Whether an arch name is known to this policy or is a source arch
    pub fn is_known(&self, arch: &str) -> bool {
        SOURCE_ARCHES.contains(&arch) || KNOWN_ARCHES.contains(&arch)
    }
}

/// Arch names accepted in `name.arch` specs
const KNOWN_ARCHES: &[&str] = &[
    "noarch", "x86_64", "athlon", "i686", "i586", "i486", "i386", "aarch64", "armv7hl",
    "armv7l", "armv6l", "armv5tel", "ppc64le", "ppc64", "ppc", "s390x", "s390", "riscv64",
    "loongarch64", "mips64el",
];
