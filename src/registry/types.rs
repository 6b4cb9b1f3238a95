//! Raw release-hosting API types (GitHub and GitLab shapes)

use serde::Deserialize;

/// Release record normalized from either host family
#[derive(Deserialize, Debug, Clone)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Release asset
#[derive(Deserialize, Debug, Clone)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    #[serde(default)]
    pub size: u64,
}

// ============================================================================
// GitLab
// ============================================================================

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct GitlabRelease {
    pub tag_name: String,
    #[serde(default)]
    pub released_at: Option<String>,
    #[serde(default)]
    pub assets: GitlabAssets,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct GitlabAssets {
    #[serde(default)]
    pub links: Vec<GitlabLink>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct GitlabLink {
    pub name: String,
    pub url: String,
}

impl From<GitlabRelease> for Release {
    fn from(r: GitlabRelease) -> Self {
        Release {
            tag_name: r.tag_name,
            published_at: r.released_at,
            assets: r
                .assets
                .links
                .into_iter()
                .map(|l| Asset {
                    name: l.name,
                    download_url: l.url,
                    size: 0,
                })
                .collect(),
        }
    }
}

// ============================================================================
// CI Artifacts (GitHub Actions)
// ============================================================================

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArtifactList {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub size_in_bytes: u64,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub workflow_run: WorkflowRun,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorkflowRun {
    pub id: u64,
    pub head_sha: String,
    #[serde(default)]
    pub head_branch: String,
}
