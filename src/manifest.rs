//! Fleet manifest: which repositories each operation visits, and in what order.
//!
//! The built-in manifest is the SWOT-Confluence fleet. A different fleet can
//! be described in a TOML file:
//!
//! ```toml
//! version = 1
//! owner = "SWOT-Confluence"
//! infrastructure = "confluence-terraform"
//! containers = ["input", "output"]
//! modules = ["input", "output"]
//!
//! [[before-modules]]
//! name = "network"
//! deployment = "VPC Network"
//!
//! [[after-modules]]
//! name = "step-function"
//! deployment = "Step Function"
//! ```
//!
//! Order is preserved exactly as written. It carries no dependency meaning
//! between modules, but top-level stages bracket the module deploys.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::model::OperationKind;

/// Manifest format version this build understands.
pub const MANIFEST_VERSION: u32 = 1;

const CONFLUENCE_OWNER: &str = "SWOT-Confluence";
const CONFLUENCE_INFRASTRUCTURE: &str = "confluence-terraform";

const CONFLUENCE_CONTAINERS: &[&str] = &[
    "clean_up",
    "combine_data",
    "init_workflow",
    "input",
    "metroman",
    "metroman_consolidation",
    "moi",
    "momma",
    "neobam",
    "offline-discharge-data-product-creation",
    "output",
    "postdiagnostics",
    "prediagnostics",
    "priors",
    "report",
    "sad",
    "setfinder",
    "sic4dvar",
    "validation",
    "ssc_model_deployment",
    "ssc_input",
];

// Lakeflow_Confluence deploys but has no container image.
const CONFLUENCE_MODULES: &[&str] = &[
    "clean_up",
    "combine_data",
    "init_workflow",
    "input",
    "Lakeflow_Confluence",
    "metroman",
    "metroman_consolidation",
    "moi",
    "momma",
    "neobam",
    "offline-discharge-data-product-creation",
    "output",
    "postdiagnostics",
    "prediagnostics",
    "priors",
    "report",
    "sad",
    "setfinder",
    "sic4dvar",
    "validation",
    "ssc_model_deployment",
    "ssc_input",
];

/// A named deployment stage of the infrastructure repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Identifier used in logs and results (e.g. `network`).
    pub name: String,

    /// Value sent as the workflow's `deployment` input (e.g. `VPC Network`).
    pub deployment: String,
}

impl Stage {
    fn new(name: &str, deployment: &str) -> Self {
        Self {
            name: name.to_string(),
            deployment: deployment.to_string(),
        }
    }
}

/// One entry of a resolved manifest: a repository, optionally at a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub repository: String,
    pub stage: Option<Stage>,
}

impl Target {
    pub fn module(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            stage: None,
        }
    }

    pub fn stage(repository: &str, stage: &Stage) -> Self {
        Self {
            repository: repository.to_string(),
            stage: Some(stage.clone()),
        }
    }
}

/// The repositories of a fleet, per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    pub version: u32,

    /// GitHub organization that owns every repository.
    pub owner: String,

    /// The infrastructure-as-code repository. Tagged and deleted with the
    /// modules, and the home of every top-level stage.
    pub infrastructure: String,

    /// Repositories that build a container image.
    pub containers: Vec<String>,

    /// Repositories that deploy.
    pub modules: Vec<String>,

    /// Stages deployed before the modules when top-level deploys are requested.
    #[serde(default)]
    pub before_modules: Vec<Stage>,

    /// Stages deployed after every module.
    #[serde(default)]
    pub after_modules: Vec<Stage>,
}

impl Manifest {
    /// The SWOT-Confluence fleet.
    pub fn confluence() -> Self {
        Self {
            version: MANIFEST_VERSION,
            owner: CONFLUENCE_OWNER.to_string(),
            infrastructure: CONFLUENCE_INFRASTRUCTURE.to_string(),
            containers: CONFLUENCE_CONTAINERS.iter().map(ToString::to_string).collect(),
            modules: CONFLUENCE_MODULES.iter().map(ToString::to_string).collect(),
            before_modules: vec![
                Stage::new("network", "VPC Network"),
                Stage::new("infrastructure", "Infrastructure"),
            ],
            after_modules: vec![Stage::new("step-function", "Step Function")],
        }
    }

    /// Load and validate a manifest from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest: Self =
            toml::from_str(&contents).map_err(|source| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Check version, required names, and per-list uniqueness.
    pub fn validate(&self) -> Result<()> {
        if self.version != MANIFEST_VERSION {
            return Err(ConfigurationError::UnsupportedManifestVersion {
                found: self.version,
                expected: MANIFEST_VERSION,
            });
        }
        if self.owner.trim().is_empty() {
            return Err(ConfigurationError::EmptyField("owner"));
        }
        if self.infrastructure.trim().is_empty() {
            return Err(ConfigurationError::EmptyField("infrastructure"));
        }

        check_list("containers", self.containers.iter().map(String::as_str))?;
        check_list("modules", self.modules.iter().map(String::as_str))?;

        // Release and delete runs append the infrastructure repository to these lists.
        for (list, repos) in [("containers", &self.containers), ("modules", &self.modules)] {
            if repos.contains(&self.infrastructure) {
                return Err(ConfigurationError::DuplicateRepository {
                    list,
                    repository: self.infrastructure.clone(),
                });
            }
        }

        let stages = self.before_modules.iter().chain(&self.after_modules);
        check_list("stages", stages.clone().map(|s| s.name.as_str()))?;
        if stages.clone().any(|s| s.deployment.trim().is_empty()) {
            return Err(ConfigurationError::EmptyField("deployment"));
        }

        Ok(())
    }

    /// The ordered targets an operation of `kind` visits.
    ///
    /// `include_top_level` only affects deploys: it brackets the modules with
    /// the infrastructure repository's before and after stages.
    pub fn resolve(&self, kind: OperationKind, include_top_level: bool) -> Vec<Target> {
        match kind {
            OperationKind::BuildContainer => {
                self.containers.iter().map(|r| Target::module(r)).collect()
            }
            OperationKind::TagRelease => self
                .containers
                .iter()
                .chain(std::iter::once(&self.infrastructure))
                .map(|r| Target::module(r))
                .collect(),
            OperationKind::DeleteRelease | OperationKind::DeleteTag => self
                .modules
                .iter()
                .chain(std::iter::once(&self.infrastructure))
                .map(|r| Target::module(r))
                .collect(),
            OperationKind::Deploy => {
                let modules = self.modules.iter().map(|r| Target::module(r));
                if !include_top_level {
                    return modules.collect();
                }
                let before = self
                    .before_modules
                    .iter()
                    .map(|s| Target::stage(&self.infrastructure, s));
                let after = self
                    .after_modules
                    .iter()
                    .map(|s| Target::stage(&self.infrastructure, s));
                before.chain(modules).chain(after).collect()
            }
        }
    }
}

fn check_list<'a>(list: &'static str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyField(list));
        }
        if !seen.insert(name) {
            return Err(ConfigurationError::DuplicateRepository {
                list,
                repository: name.to_string(),
            });
        }
    }
    Ok(())
}
