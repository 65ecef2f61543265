//! Interface classification from the kernel's `/sys/class/net` view

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const SYSFS_NET: &str = "/sys/class/net";

/// Kind of link the host is currently using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Wifi,
    Cellular,
    Wired,
    #[default]
    None,
}

impl InterfaceKind {
    /// Preference when several links are up at once
    fn rank(self) -> u8 {
        match self {
            InterfaceKind::Wired => 3,
            InterfaceKind::Wifi => 2,
            InterfaceKind::Cellular => 1,
            InterfaceKind::None => 0,
        }
    }
}

impl std::fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InterfaceKind::Wifi => "wifi",
            InterfaceKind::Cellular => "cellular",
            InterfaceKind::Wired => "wired",
            InterfaceKind::None => "none",
        };
        f.write_str(label)
    }
}

const CELLULAR_PREFIXES: [&str; 3] = ["wwan", "rmnet", "ppp"];

/// Classify the best active interface under `root`.
///
/// Loopback and interfaces whose `operstate` is not `up` are ignored. A
/// missing or unreadable root yields [`InterfaceKind::None`].
pub fn classify(root: &Path) -> InterfaceKind {
    let Ok(entries) = fs::read_dir(root) else {
        debug!(path = %root.display(), "Interface directory unavailable");
        return InterfaceKind::None;
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if name == "lo" || !is_up(&path) {
                return None;
            }
            Some(kind_of(&name, &path))
        })
        .max_by_key(|kind| kind.rank())
        .unwrap_or_default()
}

fn is_up(path: &Path) -> bool {
    fs::read_to_string(path.join("operstate"))
        .map(|state| state.trim() == "up")
        .unwrap_or(false)
}

fn kind_of(name: &str, path: &Path) -> InterfaceKind {
    if path.join("wireless").exists() || path.join("phy80211").exists() {
        InterfaceKind::Wifi
    } else if CELLULAR_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        InterfaceKind::Cellular
    } else {
        InterfaceKind::Wired
    }
}
