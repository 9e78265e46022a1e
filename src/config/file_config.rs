use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// On-disk form of the warehouse settings. Mirrors the `[CLUSTER]`, `[IAM_ROLE]`
/// and `[S3]` sections of the classic `dwh.cfg`, with lowercase keys.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FileConfig {
    pub cluster: Option<ClusterSection>,
    pub iam_role: Option<IamRoleSection>,
    pub s3: Option<S3Section>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ClusterSection {
    pub host: Option<String>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct IamRoleSection {
    pub arn: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct S3Section {
    pub log_data: Option<String>,
    pub log_jsonpath: Option<String>,
    pub song_data: Option<String>,
    pub region: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
