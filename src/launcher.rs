//! Launcher install locations
//!
//! Known compatibility tool directories of Steam, Lutris, Heroic, Bottles and
//! WineZGUI (native, Flatpak and Snap packaging), plus classification of an
//! arbitrary install directory by launcher.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::logging::{log_info, log_warning};
use crate::paths::home_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LauncherKind {
    Steam,
    Lutris,
    Heroic,
    Bottles,
    #[serde(rename = "winezgui")]
    WineZgui,
    Unknown,
}

impl LauncherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LauncherKind::Steam => "steam",
            LauncherKind::Lutris => "lutris",
            LauncherKind::Heroic => "heroic",
            LauncherKind::Bottles => "bottles",
            LauncherKind::WineZgui => "winezgui",
            LauncherKind::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LauncherKind::Steam => "Steam",
            LauncherKind::Lutris => "Lutris",
            LauncherKind::Heroic => "Heroic",
            LauncherKind::Bottles => "Bottles",
            LauncherKind::WineZgui => "WineZGUI",
            LauncherKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LauncherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steam" => Ok(LauncherKind::Steam),
            "lutris" => Ok(LauncherKind::Lutris),
            "heroic" => Ok(LauncherKind::Heroic),
            "bottles" => Ok(LauncherKind::Bottles),
            "winezgui" => Ok(LauncherKind::WineZgui),
            "unknown" => Ok(LauncherKind::Unknown),
            other => Err(format!("unknown launcher: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingKind {
    Native,
    Flatpak,
    Snap,
}

/// Kind of tool a location holds; only Heroic keeps them apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFlavor {
    Proton,
    Wine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallLocation {
    pub display_name: String,
    pub launcher: LauncherKind,
    pub packaging: PackagingKind,
    pub install_dir: PathBuf,
    pub config_dir: Option<PathBuf>,
    pub flavor: Option<ToolFlavor>,
}

impl InstallLocation {
    /// Accepts tools of `launcher`/`flavor`.
    pub fn accepts(&self, launchers: &[LauncherKind], flavor: ToolFlavor) -> bool {
        launchers.contains(&self.launcher) && self.flavor.map_or(true, |f| f == flavor)
    }
}

// ============================================================================
// Location Table
// ============================================================================

/// Steam root directories, relative to `$HOME`. Several are usually symlinks
/// to the same place.
const STEAM_ROOTS: &[&str] = &[
    ".local/share/Steam",
    ".steam/root",
    ".steam/steam",
    ".steam/debian-installation",
];

struct LocationTemplate {
    install_dir: &'static str,
    display_name: &'static str,
    launcher: LauncherKind,
    packaging: PackagingKind,
    config_dir: Option<&'static str>,
    flavor: Option<ToolFlavor>,
}

const OTHER_LOCATIONS: &[LocationTemplate] = &[
    LocationTemplate {
        install_dir: ".var/app/com.valvesoftware.Steam/data/Steam/compatibilitytools.d",
        display_name: "Steam Flatpak",
        launcher: LauncherKind::Steam,
        packaging: PackagingKind::Flatpak,
        config_dir: Some(".var/app/com.valvesoftware.Steam/.local/share/Steam/config"),
        flavor: None,
    },
    LocationTemplate {
        install_dir: "snap/steam/common/.steam/root/compatibilitytools.d",
        display_name: "Steam Snap",
        launcher: LauncherKind::Steam,
        packaging: PackagingKind::Snap,
        config_dir: Some("snap/steam/common/.steam/root/config"),
        flavor: None,
    },
    LocationTemplate {
        install_dir: ".local/share/lutris/runners/wine",
        display_name: "Lutris",
        launcher: LauncherKind::Lutris,
        packaging: PackagingKind::Native,
        config_dir: Some(".config/lutris"),
        flavor: None,
    },
    LocationTemplate {
        install_dir: ".var/app/net.lutris.Lutris/data/lutris/runners/wine",
        display_name: "Lutris Flatpak",
        launcher: LauncherKind::Lutris,
        packaging: PackagingKind::Flatpak,
        config_dir: Some(".var/app/net.lutris.Lutris/config/lutris"),
        flavor: None,
    },
    LocationTemplate {
        install_dir: ".config/heroic/tools/wine",
        display_name: "Heroic Wine",
        launcher: LauncherKind::Heroic,
        packaging: PackagingKind::Native,
        config_dir: Some(".config/heroic"),
        flavor: Some(ToolFlavor::Wine),
    },
    LocationTemplate {
        install_dir: ".config/heroic/tools/proton",
        display_name: "Heroic Proton",
        launcher: LauncherKind::Heroic,
        packaging: PackagingKind::Native,
        config_dir: Some(".config/heroic"),
        flavor: Some(ToolFlavor::Proton),
    },
    LocationTemplate {
        install_dir: ".var/app/com.heroicgameslauncher.hgl/config/heroic/tools/wine",
        display_name: "Heroic Wine Flatpak",
        launcher: LauncherKind::Heroic,
        packaging: PackagingKind::Flatpak,
        config_dir: Some(".var/app/com.heroicgameslauncher.hgl/config/heroic"),
        flavor: Some(ToolFlavor::Wine),
    },
    LocationTemplate {
        install_dir: ".var/app/com.heroicgameslauncher.hgl/config/heroic/tools/proton",
        display_name: "Heroic Proton Flatpak",
        launcher: LauncherKind::Heroic,
        packaging: PackagingKind::Flatpak,
        config_dir: Some(".var/app/com.heroicgameslauncher.hgl/config/heroic"),
        flavor: Some(ToolFlavor::Proton),
    },
    LocationTemplate {
        install_dir: ".local/share/bottles/runners",
        display_name: "Bottles",
        launcher: LauncherKind::Bottles,
        packaging: PackagingKind::Native,
        config_dir: Some(".local/share/bottles"),
        flavor: None,
    },
    LocationTemplate {
        install_dir: ".var/app/com.usebottles.bottles/data/bottles/runners",
        display_name: "Bottles Flatpak",
        launcher: LauncherKind::Bottles,
        packaging: PackagingKind::Flatpak,
        config_dir: Some(".var/app/com.usebottles.bottles/data/bottles"),
        flavor: None,
    },
    LocationTemplate {
        install_dir: ".local/share/winezgui/Runners",
        display_name: "WineZGUI",
        launcher: LauncherKind::WineZgui,
        packaging: PackagingKind::Native,
        config_dir: Some(".local/share/winezgui"),
        flavor: None,
    },
    LocationTemplate {
        install_dir: ".var/app/io.github.fastrizwaan.WineZGUI/data/winezgui/Runners",
        display_name: "WineZGUI Flatpak",
        launcher: LauncherKind::WineZgui,
        packaging: PackagingKind::Flatpak,
        config_dir: Some(".var/app/io.github.fastrizwaan.WineZGUI/data/winezgui"),
        flavor: None,
    },
];

/// Every location ctup knows about, relative to `home`, whether present or not.
///
/// Steam roots that resolve to the same directory are listed once.
pub fn possible_install_locations_in(home: &Path) -> Vec<InstallLocation> {
    let mut locations = Vec::new();
    let mut seen_steam_roots = HashSet::new();

    for root in STEAM_ROOTS {
        let root_path = home.join(root);
        let key = fs::canonicalize(&root_path).unwrap_or_else(|_| root_path.clone());
        if !seen_steam_roots.insert(key) {
            continue;
        }
        locations.push(InstallLocation {
            display_name: "Steam".to_string(),
            launcher: LauncherKind::Steam,
            packaging: PackagingKind::Native,
            install_dir: root_path.join("compatibilitytools.d"),
            config_dir: Some(root_path.join("config")),
            flavor: None,
        });
    }

    locations.extend(OTHER_LOCATIONS.iter().map(|t| InstallLocation {
        display_name: t.display_name.to_string(),
        launcher: t.launcher,
        packaging: t.packaging,
        install_dir: home.join(t.install_dir),
        config_dir: t.config_dir.map(|c| home.join(c)),
        flavor: t.flavor,
    }));

    locations
}

pub fn possible_install_locations() -> Vec<InstallLocation> {
    possible_install_locations_in(&home_dir())
}

/// A location is usable when its launcher is installed, judged by the
/// launcher's config directory (or the install directory itself).
fn is_present(location: &InstallLocation) -> bool {
    location.install_dir.is_dir()
        || location
            .config_dir
            .as_deref()
            .is_some_and(|c| c.is_dir())
}

/// Locations present on this system relative to `home`, plus the configured
/// custom directory.
pub fn available_install_locations_in(home: &Path, config: &AppConfig) -> Vec<InstallLocation> {
    let mut locations: Vec<InstallLocation> = possible_install_locations_in(home)
        .into_iter()
        .filter(is_present)
        .collect();

    if let Some(custom) = &config.custom_install_dir {
        if !locations.iter().any(|l| &l.install_dir == custom) {
            locations.push(InstallLocation {
                display_name: "Custom".to_string(),
                launcher: config
                    .custom_install_launcher
                    .unwrap_or_else(|| get_launcher_from_installdir(custom)),
                packaging: PackagingKind::Native,
                install_dir: custom.clone(),
                config_dir: None,
                flavor: None,
            });
        }
    }

    locations
}

pub fn available_install_locations(config: &AppConfig) -> Vec<InstallLocation> {
    available_install_locations_in(&home_dir(), config)
}

/// Classifies an install directory by launcher from its path.
pub fn get_launcher_from_installdir(install_dir: &Path) -> LauncherKind {
    let path = install_dir.to_string_lossy().to_lowercase();

    if path.contains("compatibilitytools.d") {
        LauncherKind::Steam
    } else if path.contains("lutris") {
        LauncherKind::Lutris
    } else if path.contains("heroic") {
        LauncherKind::Heroic
    } else if path.contains("bottles") {
        LauncherKind::Bottles
    } else if path.contains("winezgui") {
        LauncherKind::WineZgui
    } else {
        LauncherKind::Unknown
    }
}

/// Creates missing `compatibilitytools.d` directories below existing Steam roots.
pub fn create_compatibilitytools_folders_in(home: &Path) -> Vec<PathBuf> {
    let mut created = Vec::new();

    for location in possible_install_locations_in(home)
        .into_iter()
        .filter(|l| l.launcher == LauncherKind::Steam)
    {
        let Some(root) = location.install_dir.parent() else {
            continue;
        };
        let config_present = location.config_dir.as_deref().is_some_and(|c| c.is_dir());
        if !root.is_dir() || !config_present || location.install_dir.exists() {
            continue;
        }
        match fs::create_dir_all(&location.install_dir) {
            Ok(()) => {
                log_info(&format!("Created {}", location.install_dir.display()));
                created.push(location.install_dir);
            }
            Err(e) => log_warning(&format!(
                "Could not create {}: {}",
                location.install_dir.display(),
                e
            )),
        }
    }

    created
}

pub fn create_compatibilitytools_folders() -> Vec<PathBuf> {
    create_compatibilitytools_folders_in(&home_dir())
}
