//! Fixture input shapes.
//!
//! A module accepts its catalog metadata either as flat `catalog_data_*`
//! variables or as one `catalog_data` object, never both.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::identifier::RepositoryName;
use crate::terraform::VarValue;

/// Prefix of the flat catalog variables.
pub const FLAT_CATALOG_PREFIX: &str = "catalog_data_";

/// Variable that receives the structured catalog object.
pub const CATALOG_DATA_VAR: &str = "catalog_data";

/// Variable that receives the repository name.
pub const REPOSITORY_NAME_VAR: &str = "repository_name";

/// Catalog metadata shown on the public gallery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogData {
    /// Short description.
    pub description: String,
    /// Markdown "about" section.
    pub about_text: String,
    /// Markdown usage section.
    pub usage_text: String,
    /// Supported CPU architectures (for example `x86-64`).
    pub architectures: Vec<String>,
    /// Supported operating systems (for example `Linux`).
    pub operating_systems: Vec<String>,
}

impl CatalogData {
    /// Smallest catalog accepted by the registry; keeps fixtures fast.
    #[must_use]
    pub fn minimal(name: &RepositoryName) -> Self {
        Self {
            description: String::from("Test container"),
            about_text: String::from("# Test\nBasic test container."),
            usage_text: format!(
                "# Usage\n```bash\ndocker pull public.ecr.aws/registry/{name}:latest\n```"
            ),
            architectures: vec![String::from("x86-64")],
            operating_systems: vec![String::from("Linux")],
        }
    }

    fn fields(&self) -> [(&'static str, VarValue); 5] {
        [
            ("description", VarValue::from(self.description.as_str())),
            ("about_text", VarValue::from(self.about_text.as_str())),
            ("usage_text", VarValue::from(self.usage_text.as_str())),
            ("architectures", VarValue::from(self.architectures.clone())),
            (
                "operating_systems",
                VarValue::from(self.operating_systems.clone()),
            ),
        ]
    }
}

impl From<&CatalogData> for VarValue {
    fn from(catalog: &CatalogData) -> Self {
        Self::Object(
            catalog
                .fields()
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value))
                .collect(),
        )
    }
}

/// Module inputs for one fixture.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FixtureConfiguration {
    /// Flat scalar or list variables.
    FlatVars(BTreeMap<String, VarValue>),
    /// One structured catalog object.
    Structured(CatalogData),
}

impl FixtureConfiguration {
    /// Starts a builder that enforces exactly one populated shape.
    #[must_use]
    pub fn builder() -> FixtureConfigurationBuilder {
        FixtureConfigurationBuilder::default()
    }

    /// Minimal catalog expressed as flat `catalog_data_*` variables.
    #[must_use]
    pub fn minimal_flat(name: &RepositoryName) -> Self {
        Self::FlatVars(
            CatalogData::minimal(name)
                .fields()
                .into_iter()
                .map(|(key, value)| (format!("{FLAT_CATALOG_PREFIX}{key}"), value))
                .collect(),
        )
    }

    /// Renders the module variables for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ReservedVariable`] when flat variables
    /// already set the repository name.
    pub fn to_vars(
        &self,
        name: &RepositoryName,
    ) -> Result<BTreeMap<String, VarValue>, ConfigurationError> {
        let mut vars = match self {
            Self::FlatVars(flat) => {
                if flat.contains_key(REPOSITORY_NAME_VAR) {
                    return Err(ConfigurationError::ReservedVariable {
                        variable: REPOSITORY_NAME_VAR.to_owned(),
                    });
                }
                flat.clone()
            }
            Self::Structured(catalog) => {
                BTreeMap::from([(CATALOG_DATA_VAR.to_owned(), VarValue::from(catalog))])
            }
        };
        vars.insert(
            REPOSITORY_NAME_VAR.to_owned(),
            VarValue::from(name.as_str()),
        );
        Ok(vars)
    }
}

/// Errors raised while assembling a [`FixtureConfiguration`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigurationError {
    /// Neither shape was populated.
    #[error("fixture configuration is empty: set flat variables or catalog data")]
    Empty,
    /// Both shapes were populated.
    #[error("fixture configuration sets both flat variables and catalog data")]
    BothVariants,
    /// A variable managed by the launcher was supplied by the caller.
    #[error("variable {variable} is set by the launcher and cannot be overridden")]
    ReservedVariable {
        /// Offending variable.
        variable: String,
    },
}

/// Builder for [`FixtureConfiguration`].
#[derive(Clone, Debug, Default)]
pub struct FixtureConfigurationBuilder {
    vars: BTreeMap<String, VarValue>,
    catalog: Option<CatalogData>,
}

impl FixtureConfigurationBuilder {
    /// Adds a flat variable.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<VarValue>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Sets the structured catalog object.
    #[must_use]
    pub fn catalog_data(mut self, catalog: CatalogData) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Finishes the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Empty`] or
    /// [`ConfigurationError::BothVariants`] unless exactly one shape is set.
    pub fn build(self) -> Result<FixtureConfiguration, ConfigurationError> {
        match (self.vars.is_empty(), self.catalog) {
            (true, None) => Err(ConfigurationError::Empty),
            (false, Some(_)) => Err(ConfigurationError::BothVariants),
            (false, None) => Ok(FixtureConfiguration::FlatVars(self.vars)),
            (true, Some(catalog)) => Ok(FixtureConfiguration::Structured(catalog)),
        }
    }
}

/// Tracking tags for fixtures whose module accepts a `tags` map.
#[must_use]
pub fn test_tags(test_name: &str, run_id: &str) -> BTreeMap<String, String> {
    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    [
        ("Purpose", String::from("terratest")),
        ("TestRun", run_id.to_owned()),
        ("TestName", test_name.to_owned()),
        ("CreatedAt", created_at.to_string()),
        ("CreatedBy", String::from(env!("CARGO_PKG_NAME"))),
        ("Environment", String::from("test")),
        ("ManagedBy", String::from("terratest")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_owned(), value))
    .collect()
}
