use crate::config::components::connections::{AdapterConnectionDetails, ConnectionsConfig};
use crate::config::components::project::WharfProjectConfig;
use crate::config::error::ConfigError;
use crate::types::definitions::{IntegrationDefinition, TransformationDefinition};
use std::collections::HashMap;

// ---------------- global config ----------------
#[derive(Debug)]
pub struct WharfConfig {
    pub project: WharfProjectConfig,
    pub integrations: HashMap<String, IntegrationDefinition>,
    pub transformations: HashMap<String, TransformationDefinition>,
    pub connections: ConnectionsConfig,
}

impl WharfConfig {
    pub fn new(
        project: WharfProjectConfig,
        integrations: HashMap<String, IntegrationDefinition>,
        transformations: HashMap<String, TransformationDefinition>,
        connections: ConnectionsConfig,
    ) -> Self {
        Self {
            project,
            integrations,
            transformations,
            connections,
        }
    }

    pub fn get_adapter_connection_details(&self, name: &str) -> Option<AdapterConnectionDetails> {
        self.connections
            .get(&self.project.connection_profile.profile)
            .and_then(|conns| conns.get(name))
            .cloned()
    }

    pub fn warehouse_connection_details(&self) -> Result<AdapterConnectionDetails, ConfigError> {
        self.get_adapter_connection_details(&self.project.warehouse_connection)
            .ok_or_else(|| {
                ConfigError::not_found(format!(
                    "warehouse connection '{}' not found in profile '{}'",
                    self.project.warehouse_connection, self.project.connection_profile.profile
                ))
            })
    }

    pub fn get_integration(&self, name: &str) -> Result<&IntegrationDefinition, ConfigError> {
        self.integrations.get(name).ok_or_else(|| {
            ConfigError::not_found(format!(
                "Integration '{}' not found in registered config, available integrations are {}",
                name,
                self.integrations
                    .keys()
                    .map(|k| k.to_string())
                    .collect::<Vec<String>>()
                    .join(", "),
            ))
        })
    }

    pub fn get_transformation(&self, name: &str) -> Result<&TransformationDefinition, ConfigError> {
        self.transformations.get(name).ok_or_else(|| {
            ConfigError::not_found(format!(
                "Transformation '{}' not found in registered config, available transformations are {}",
                name,
                self.transformations
                    .keys()
                    .map(|k| k.to_string())
                    .collect::<Vec<String>>()
                    .join(", "),
            ))
        })
    }
}
