//! Release resolution: registry release + requested tag -> `ReleaseInfo`

use chrono::NaiveDate;

use crate::error::Result;
use crate::registry::{RegistryClient, Release};

/// Asset suffix of the checksum reference file
pub const CHECKSUM_SUFFIX: &str = "sha512sum";

/// Normalized description of one downloadable release
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseInfo {
    pub version: String,
    pub date: Option<NaiveDate>,
    pub download_url: String,
    pub checksum_url: Option<String>,
    pub size: u64,
}

impl ReleaseInfo {
    /// File name of the archive, taken from the last URL segment.
    pub fn file_name(&self) -> &str {
        self.download_url
            .rsplit('/')
            .next()
            .unwrap_or(&self.download_url)
    }
}

/// Parses the date portion of an ISO-8601 timestamp.
pub fn parse_date(timestamp: &str) -> Option<NaiveDate> {
    let date = timestamp.split('T').next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Picks the download and checksum assets out of a release.
///
/// Returns `None` when no asset ends in `archive_suffix`: the version is not
/// available for this tool.
pub fn release_info_from(release: &Release, archive_suffix: &str) -> Option<ReleaseInfo> {
    let download = release
        .assets
        .iter()
        .find(|a| a.name.ends_with(archive_suffix))?;
    let checksum = release
        .assets
        .iter()
        .find(|a| a.name.ends_with(CHECKSUM_SUFFIX));

    Some(ReleaseInfo {
        version: release.tag_name.clone(),
        date: release.published_at.as_deref().and_then(parse_date),
        download_url: download.download_url.clone(),
        checksum_url: checksum.map(|c| c.download_url.clone()),
        size: download.size,
    })
}

/// Resolves `tag` (or the latest release when empty) to a `ReleaseInfo`.
pub fn resolve(
    base_url: &str,
    archive_suffix: &str,
    client: &RegistryClient,
    tag: Option<&str>,
) -> Result<Option<ReleaseInfo>> {
    let tag = tag.filter(|t| !t.is_empty());
    let Some(release) = client.get_release(base_url, tag)? else {
        return Ok(None);
    };
    Ok(release_info_from(&release, archive_suffix))
}

/// Lists release tags of one page, newest first.
pub fn list_versions(
    base_url: &str,
    client: &RegistryClient,
    count: u32,
    page: u32,
) -> Result<Vec<String>> {
    Ok(client
        .list_releases(base_url, page, count)?
        .into_iter()
        .map(|r| r.tag_name)
        .collect())
}
