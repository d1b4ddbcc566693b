//! Configuration module for DataForge-RS
//!
//! This module handles persisted configuration:
//! - Project files (JSON) holding a complete pipeline definition
//! - Engine settings (TOML), see [`settings`]
//!
//! # Project file layout
//!
//! ```json
//! {
//!   "version": 1,
//!   "pipeline": {
//!     "id": "sales",
//!     "name": "Sales by department",
//!     "nodes": [
//!       { "id": "by_dept", "type": "group",
//!         "config": { "groupBy": ["dept"],
//!                     "aggregations": [{ "column": "sal", "function": "sum" }] } }
//!     ],
//!     "connections": [],
//!     "dataSources": [
//!       { "targetId": "by_dept",
//!         "dataset": { "id": "staff", "rows": [{ "dept": "eng", "sal": 100 }] } }
//!     ]
//!   },
//!   "settings": { "parallel_branches": false }
//! }
//! ```
//!
//! Node ids are free-form strings in the file and map to arena [`NodeId`]s
//! once the project is built. Ports default to `output` → `input`.
//!
//! # Example
//!
//! ```no_run
//! use dataforge_rs::config::ProjectFile;
//!
//! # fn main() -> dataforge_rs::Result<()> {
//! let project = ProjectFile::load("sales.json")?;
//! let mut built = project.build()?;
//! let outputs = built.pipeline.execute()?;
//! for (node, dataset) in built.name_outputs(&outputs) {
//!     println!("{}: {} rows", node, dataset.row_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{DataForgeError, Result};
use crate::pipeline::{
    NodeConfig, NodeId, NodeType, Pipeline, PipelineError, RunOutput, TransformNode, INPUT_PORT,
    OUTPUT_PORT,
};
use crate::types::Dataset;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Current project file format version
pub const PROJECT_FILE_VERSION: u32 = 1;

/// Project file extension
pub const PROJECT_FILE_EXTENSION: &str = "json";

/// A complete project: pipeline definition plus engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Project file format version for future compatibility
    #[serde(default = "default_project_version")]
    pub version: u32,

    pub pipeline: PipelineDefinition,

    #[serde(default)]
    pub settings: EngineSettings,
}

fn default_project_version() -> u32 {
    PROJECT_FILE_VERSION
}

/// Serialized pipeline graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,

    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,

    #[serde(default)]
    pub data_sources: Vec<DataSourceDefinition>,
}

/// One node of a serialized pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,

    /// Node kind, e.g. `"filter"`
    #[serde(rename = "type")]
    pub kind: String,

    /// Display name; the kind's template name when empty
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Kind-specific configuration; `null` selects the template
    #[serde(default)]
    pub config: serde_json::Value,
}

/// An edge between two serialized nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDefinition {
    pub source_id: String,
    pub target_id: String,

    #[serde(default = "default_output_port")]
    pub source_port: String,

    #[serde(default = "default_input_port")]
    pub target_port: String,
}

/// A seed dataset bound to a node input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDefinition {
    pub target_id: String,

    #[serde(default = "default_input_port")]
    pub target_port: String,

    pub dataset: Dataset,
}

fn default_output_port() -> String {
    OUTPUT_PORT.to_string()
}

fn default_input_port() -> String {
    INPUT_PORT.to_string()
}

/// A pipeline built from a project file, with its string-id mapping.
#[derive(Debug, Clone)]
pub struct BuiltPipeline {
    pub pipeline: Pipeline,
    /// Project node id → arena node id, in file order
    pub node_ids: IndexMap<String, NodeId>,
}

impl BuiltPipeline {
    /// Arena id of a project node.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_ids.get(name).copied()
    }

    /// Re-key run outputs by project node id, keeping execution order.
    pub fn name_outputs<'a>(&self, outputs: &'a RunOutput) -> IndexMap<String, &'a Dataset> {
        let names: IndexMap<NodeId, &str> = self
            .node_ids
            .iter()
            .map(|(name, id)| (*id, name.as_str()))
            .collect();
        outputs
            .iter()
            .filter_map(|(id, dataset)| {
                names
                    .get(id)
                    .map(|name| (name.to_string(), dataset.as_ref()))
            })
            .collect()
    }
}

impl ProjectFile {
    /// Wrap a pipeline definition with default settings.
    pub fn new(pipeline: PipelineDefinition) -> Self {
        Self {
            version: PROJECT_FILE_VERSION,
            pipeline,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Parse a project from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut project: Self = serde_json::from_str(content)
            .map_err(|e| DataForgeError::Config(format!("Failed to parse project: {}", e)))?;
        for source in &mut project.pipeline.data_sources {
            source.dataset.refresh_columns();
        }
        Ok(project)
    }

    /// Serialize the project as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a project file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataForgeError::Config(format!("Failed to read project file {:?}: {}", path, e))
        })?;
        let project = Self::from_json_str(&content)
            .map_err(|e| e.with_context(format!("Project file {:?}", path)))?;
        if project.version > PROJECT_FILE_VERSION {
            tracing::warn!(
                "Project file {:?} has version {}, newer than supported {}",
                path,
                project.version,
                PROJECT_FILE_VERSION
            );
        }
        Ok(project)
    }

    /// Save project file to disk as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DataForgeError::Config(format!("Failed to create project directory: {}", e))
            })?;
        }
        let content = self.to_json_string()?;
        std::fs::write(path, content).map_err(|e| {
            DataForgeError::Config(format!("Failed to write project file {:?}: {}", path, e))
        })?;
        tracing::info!("Saved project to {:?}", path);
        Ok(())
    }

    /// Resolve node kinds and configurations and assemble a [`Pipeline`].
    pub fn build(&self) -> Result<BuiltPipeline> {
        self.settings.validate()?;
        let def = &self.pipeline;
        let mut pipeline = Pipeline::new(def.id.clone(), def.name.clone())
            .with_description(def.description.clone())
            .with_settings(self.settings.clone());
        let mut node_ids = IndexMap::with_capacity(def.nodes.len());

        for node_def in &def.nodes {
            if node_ids.contains_key(&node_def.id) {
                return Err(DataForgeError::Config(format!(
                    "Duplicate node id '{}'",
                    node_def.id
                )));
            }
            let kind = NodeType::from_str(&node_def.kind)?;
            let config = NodeConfig::from_json(kind, node_def.config.clone()).map_err(|e| {
                PipelineError::InvalidConfig {
                    node: node_def.id.clone(),
                    message: e.to_string(),
                }
            })?;
            let name = if node_def.name.is_empty() {
                kind.display_name().to_string()
            } else {
                node_def.name.clone()
            };
            let id = pipeline
                .add_node(TransformNode::new(name, config).with_description(&node_def.description));
            node_ids.insert(node_def.id.clone(), id);
        }

        let lookup = |name: &str| {
            node_ids.get(name).copied().ok_or_else(|| {
                PipelineError::InvalidEdge(format!("reference to unknown node '{}'", name))
            })
        };

        for conn in &def.connections {
            let from = lookup(&conn.source_id)?;
            let to = lookup(&conn.target_id)?;
            pipeline.connect(from, &conn.source_port, to, &conn.target_port)?;
        }

        for source in &def.data_sources {
            let node = lookup(&source.target_id)?;
            pipeline.attach_seed(node, &source.target_port, source.dataset.clone())?;
        }

        tracing::debug!(
            "Built pipeline '{}' with {} nodes, {} connections, {} data sources",
            def.id,
            def.nodes.len(),
            def.connections.len(),
            def.data_sources.len()
        );
        Ok(BuiltPipeline { pipeline, node_ids })
    }

    /// Capture a live pipeline. Nodes are named `n<index>`.
    pub fn from_pipeline(pipeline: &Pipeline) -> Result<Self> {
        let node_name = |id: NodeId| format!("n{}", id.0);

        let nodes = pipeline
            .nodes()
            .map(|(id, node)| -> Result<NodeDefinition> {
                Ok(NodeDefinition {
                    id: node_name(id),
                    kind: node.kind().as_str().to_string(),
                    name: node.name.clone(),
                    description: node.description.clone(),
                    config: node.config.to_json()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let connections = pipeline
            .edges()
            .iter()
            .map(|edge| ConnectionDefinition {
                source_id: node_name(edge.from_node),
                target_id: node_name(edge.to_node),
                source_port: edge.from_port.to_string(),
                target_port: edge.to_port.to_string(),
            })
            .collect();

        let data_sources = pipeline
            .seeds()
            .iter()
            .map(|seed| DataSourceDefinition {
                target_id: node_name(seed.node),
                target_port: seed.port.to_string(),
                dataset: Dataset::clone(&seed.dataset),
            })
            .collect();

        Ok(Self {
            version: PROJECT_FILE_VERSION,
            pipeline: PipelineDefinition {
                id: pipeline.id().to_string(),
                name: pipeline.name().to_string(),
                description: pipeline.description().to_string(),
                nodes,
                connections,
                data_sources,
            },
            settings: pipeline.settings().clone(),
        })
    }
}
