//! query-string parameter shapes shared by the listing/entry routes. Field
//! defaults mirror the original server's `_get_*` helpers: booleans travel
//! on the wire as `0`/`1`.

use serde::Deserialize;

use crate::traversal::FilterBy;

fn default_true() -> bool {
    true
}

fn default_bool_true() -> bool {
    true
}

fn default_bool_false() -> bool {
    false
}

#[derive(Debug, Deserialize)]
pub struct EntryParams {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub shallow: Option<u8>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub committer: Option<String>,
    #[serde(default = "default_bool_true")]
    #[serde(deserialize_with = "deserialize_optional_int_bool_true")]
    pub flatten_keys: bool,
    /// accepted for client compatibility; has no effect on write behavior,
    /// see `PutOptions::overwrite`.
    #[serde(default = "default_bool_false")]
    #[serde(deserialize_with = "deserialize_optional_int_bool_false")]
    pub overwrite: bool,
}

impl Default for EntryParams {
    fn default() -> Self {
        Self {
            branch: None,
            commit_sha: None,
            shallow: None,
            author: None,
            committer: None,
            flatten_keys: true,
            overwrite: false,
        }
    }
}

fn deserialize_optional_int_bool_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<u8> = Deserialize::deserialize(deserializer)?;
    Ok(opt.map(|n| n != 0).unwrap_or(true))
}

fn deserialize_optional_int_bool_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<u8> = Deserialize::deserialize(deserializer)?;
    Ok(opt.map(|n| n != 0).unwrap_or(false))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_level: Option<usize>,
    #[serde(default)]
    pub max_level: Option<usize>,
    #[serde(default)]
    pub object_depth: Option<usize>,
    #[serde(default = "default_true")]
    #[serde(deserialize_with = "int_to_bool_default_true")]
    pub depth_first: bool,
    #[serde(default)]
    pub filter_by: Option<String>,
}

fn int_to_bool_default_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<u8> = Deserialize::deserialize(deserializer)?;
    Ok(opt.map(|n| n != 0).unwrap_or(true))
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            branch: None,
            commit_sha: None,
            pattern: None,
            min_level: None,
            max_level: None,
            object_depth: None,
            depth_first: true,
            filter_by: None,
        }
    }
}

impl ListParams {
    pub fn filter_by(&self) -> FilterBy {
        match self.filter_by.as_deref() {
            Some("leaves") => FilterBy::LeavesOnly,
            Some("trees") => FilterBy::TreesOnly,
            _ => FilterBy::All,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct BranchParams {
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MergeParams {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub committer: Option<String>,
}
