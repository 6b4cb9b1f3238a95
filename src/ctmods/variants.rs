//! Static table of provisionable tool variants

use std::path::{Path, PathBuf};

use crate::archive::ArchiveFormat;
use crate::launcher::{LauncherKind, ToolFlavor};
use crate::normalize::NamingRule;

/// Where a variant's metadata and archives come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Versioned releases from a release API
    Releases { api_url: &'static str },
    /// CI artifacts of one branch, downloaded through a redirector.
    /// `download_template` contains `{run_id}` and `{name}`.
    CiArtifacts {
        api_url: &'static str,
        branch: &'static str,
        download_template: &'static str,
    },
    /// One branch archive without releases
    Branch {
        archive_url: &'static str,
        branch: &'static str,
    },
}

/// Directory the archive is extracted below
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractTarget {
    /// The selected install directory
    InstallDir,
    /// A launcher-owned runtime directory named `dir`: `../../runtime/<dir>`
    /// for Lutris and `../<dir>` for Heroic, relative to the install directory
    LauncherRuntime(&'static str),
}

impl ExtractTarget {
    pub fn resolve(&self, install_dir: &Path, launcher: LauncherKind) -> PathBuf {
        match (self, launcher) {
            (ExtractTarget::LauncherRuntime(dir), LauncherKind::Lutris) => install_dir
                .parent()
                .and_then(Path::parent)
                .map(|root| root.join("runtime").join(dir))
                .unwrap_or_else(|| install_dir.to_path_buf()),
            (ExtractTarget::LauncherRuntime(dir), LauncherKind::Heroic) => install_dir
                .parent()
                .map(|root| root.join(dir))
                .unwrap_or_else(|| install_dir.to_path_buf()),
            _ => install_dir.to_path_buf(),
        }
    }
}

/// What to do when the final directory already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingPolicy {
    /// Reconcile against the remote checksum, refuse when unverifiable
    Reconcile,
    /// Always replace
    Replace,
}

/// Immutable descriptor of one tool variant
#[derive(Debug)]
pub struct ToolVariant {
    pub name: &'static str,
    pub description: &'static str,
    pub launchers: &'static [LauncherKind],
    pub flavor: ToolFlavor,
    pub source: Source,
    pub format: ArchiveFormat,
    pub naming: NamingRule,
    pub extract_target: ExtractTarget,
    pub existing: ExistingPolicy,
    /// Version-specific info pages append the version to this URL
    pub info_url: &'static str,
}

impl ToolVariant {
    pub fn registry_url(&self) -> &'static str {
        match self.source {
            Source::Releases { api_url } | Source::CiArtifacts { api_url, .. } => api_url,
            Source::Branch { archive_url, .. } => archive_url,
        }
    }

    pub fn supports(&self, launcher: LauncherKind) -> bool {
        self.launchers.contains(&launcher)
    }
}

pub static VARIANTS: &[ToolVariant] = &[
    ToolVariant {
        name: "GE-Proton",
        description: "Steam compatibility tool based on Wine and additional components.",
        launchers: &[LauncherKind::Steam, LauncherKind::Heroic, LauncherKind::Bottles],
        flavor: ToolFlavor::Proton,
        source: Source::Releases {
            api_url: "https://api.github.com/repos/GloriousEggroll/proton-ge-custom/releases",
        },
        format: ArchiveFormat::TarGz,
        naming: NamingRule::GeProton,
        extract_target: ExtractTarget::InstallDir,
        existing: ExistingPolicy::Reconcile,
        info_url: "https://github.com/GloriousEggroll/proton-ge-custom/releases/tag/",
    },
    ToolVariant {
        name: "Wine-GE",
        description: "Compatibility tool \"Wine\" to run Windows games on Linux. Based on Valve Wine, optimized for most games.",
        launchers: &[
            LauncherKind::Lutris,
            LauncherKind::Heroic,
            LauncherKind::Bottles,
            LauncherKind::WineZgui,
        ],
        flavor: ToolFlavor::Wine,
        source: Source::Releases {
            api_url: "https://api.github.com/repos/GloriousEggroll/wine-ge-custom/releases",
        },
        format: ArchiveFormat::TarXz,
        naming: NamingRule::WineGe,
        extract_target: ExtractTarget::InstallDir,
        existing: ExistingPolicy::Reconcile,
        info_url: "https://github.com/GloriousEggroll/wine-ge-custom/releases/tag/",
    },
    ToolVariant {
        name: "vkd3d-proton",
        description: "Fork of Wine's VKD3D which aims to implement the full Direct3D 12 API on top of Vulkan.",
        launchers: &[LauncherKind::Lutris, LauncherKind::Heroic],
        flavor: ToolFlavor::Wine,
        source: Source::Releases {
            api_url: "https://api.github.com/repos/HansKristian-Work/vkd3d-proton/releases",
        },
        format: ArchiveFormat::TarZst,
        naming: NamingRule::Prefixed("vkd3d-proton-"),
        extract_target: ExtractTarget::LauncherRuntime("vkd3d"),
        existing: ExistingPolicy::Reconcile,
        info_url: "https://github.com/HansKristian-Work/vkd3d-proton/releases/tag/",
    },
    ToolVariant {
        name: "DXVK",
        description: "Vulkan-based implementation of D3D9, D3D10 and D3D11 for Linux / Wine.",
        launchers: &[LauncherKind::Lutris, LauncherKind::Heroic],
        flavor: ToolFlavor::Wine,
        source: Source::Releases {
            api_url: "https://api.github.com/repos/doitsujin/dxvk/releases",
        },
        format: ArchiveFormat::TarGz,
        naming: NamingRule::Prefixed("dxvk-"),
        extract_target: ExtractTarget::LauncherRuntime("dxvk"),
        existing: ExistingPolicy::Reconcile,
        info_url: "https://github.com/doitsujin/dxvk/releases/tag/",
    },
    ToolVariant {
        name: "DXVK (nightly)",
        description: "Nightly version of DXVK (master branch), a Vulkan based implementation of Direct3D 8, 9, 10 and 11 for Linux/Wine.",
        launchers: &[LauncherKind::Lutris],
        flavor: ToolFlavor::Wine,
        source: Source::CiArtifacts {
            api_url: "https://api.github.com/repos/doitsujin/dxvk/actions/artifacts",
            branch: "master",
            download_template: "https://nightly.link/doitsujin/dxvk/actions/runs/{run_id}/{name}.zip",
        },
        format: ArchiveFormat::Zip,
        naming: NamingRule::Unrooted("dxvk-git-"),
        extract_target: ExtractTarget::LauncherRuntime("dxvk"),
        existing: ExistingPolicy::Reconcile,
        info_url: "https://github.com/doitsujin/dxvk/commit/",
    },
    ToolVariant {
        name: "Steam-Play-None",
        description: "Run Linux games as is, even if Valve recommends Proton for a game.",
        launchers: &[LauncherKind::Steam],
        flavor: ToolFlavor::Proton,
        source: Source::Branch {
            archive_url: "https://github.com/Scrumplex/Steam-Play-None/archive/refs/heads/main.tar.gz",
            branch: "main",
        },
        format: ArchiveFormat::TarGz,
        naming: NamingRule::Fixed {
            extracted: "Steam-Play-None-main",
            installed: "Steam-Play-None",
        },
        extract_target: ExtractTarget::InstallDir,
        existing: ExistingPolicy::Replace,
        info_url: "https://github.com/Scrumplex/Steam-Play-None",
    },
];

/// Case-insensitive lookup by variant name.
pub fn find_variant(name: &str) -> Option<&'static ToolVariant> {
    VARIANTS.iter().find(|v| v.name.eq_ignore_ascii_case(name))
}

pub fn variants_for_launcher(launcher: LauncherKind) -> impl Iterator<Item = &'static ToolVariant> {
    VARIANTS.iter().filter(move |v| v.supports(launcher))
}
