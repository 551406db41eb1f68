use crate::config::components::connections::ConnectionsConfig;
use crate::config::components::global::WharfConfig;
use crate::config::components::project::WharfProjectFile;
use crate::config::error::ConfigError;
use crate::types::definitions::{IntegrationDefinition, TransformationDefinition};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_CONFIG_FILE: &str = "wharf.yml";

/// One file under the definitions directory. A file may declare any mix of
/// integrations and transformations.
#[derive(Debug, Default, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    integrations: Vec<IntegrationDefinition>,
    #[serde(default)]
    transformations: Vec<TransformationDefinition>,
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Assemble the global [`WharfConfig`] from the project file, the connection
/// profile it points at, and every definition file under `definitions_dir`.
/// Relative paths are resolved against the project file's directory.
pub fn read_config(config_path: Option<PathBuf>) -> Result<WharfConfig, ConfigError> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let raw = std::fs::read_to_string(&config_path)
        .map_err(|e| ConfigError::io(format!("reading {}", config_path.display()), e))?;
    let project_file: WharfProjectFile = serde_yaml::from_str(&raw)?;
    let project = project_file.project;

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let connections_path = base_dir.join(&project.connection_profile.path);
    let raw = std::fs::read_to_string(&connections_path)
        .map_err(|e| ConfigError::io(format!("reading {}", connections_path.display()), e))?;
    let connections: ConnectionsConfig = serde_yaml::from_str(&raw)?;

    let definitions_dir = base_dir.join(&project.definitions_dir);
    let (integrations, transformations) = read_definitions(&definitions_dir)?;

    log::debug!(
        "loaded {} integrations and {} transformations from {}",
        integrations.len(),
        transformations.len(),
        definitions_dir.display()
    );

    Ok(WharfConfig::new(
        project,
        integrations,
        transformations,
        connections,
    ))
}

type Definitions = (
    HashMap<String, IntegrationDefinition>,
    HashMap<String, TransformationDefinition>,
);

fn read_definitions(dir: &Path) -> Result<Definitions, ConfigError> {
    let mut integrations = HashMap::new();
    let mut transformations = HashMap::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() || !is_yaml(entry.path()) {
            continue;
        }
        let raw = std::fs::read_to_string(entry.path())
            .map_err(|e| ConfigError::io(format!("reading {}", entry.path().display()), e))?;
        let file: DefinitionFile = serde_yaml::from_str(&raw)?;

        for def in file.integrations {
            if integrations.insert(def.name.clone(), def).is_some() {
                return Err(ConfigError::duplicate(entry.path().display().to_string()));
            }
        }
        for def in file.transformations {
            if transformations.insert(def.name.clone(), def).is_some() {
                return Err(ConfigError::duplicate(entry.path().display().to_string()));
            }
        }
    }

    Ok((integrations, transformations))
}
