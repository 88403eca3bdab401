//! Response types for `aws ecr-public describe-repositories`.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct DescribeRepositoriesResponse {
    pub(super) repositories: Vec<RepositorySummary>,
}

/// Repository entry reported by the administrative API.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    /// Repository name.
    pub repository_name: String,
    /// Public pull URI, when reported.
    #[serde(default)]
    pub repository_uri: Option<String>,
    /// Repository ARN, when reported.
    #[serde(default)]
    pub repository_arn: Option<String>,
}
