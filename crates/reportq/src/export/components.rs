//! Component tree export.
//!
//! Walks a project's component tree (project, modules, directories, files)
//! and writes it as a single `components.json` document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ReportPublisher;
use crate::error::ExportError;

/// File name of the component export inside a report directory.
pub const COMPONENTS_FILE: &str = "components.json";

/// Role a resource plays in the analysed project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRole {
    File,
    Directory,
    Module,
    Project,
    Library,
    View,
    SubView,
}

impl ResourceRole {
    /// Exported type for this role, if the exporter understands it.
    pub fn component_type(self) -> Option<ComponentType> {
        match self {
            ResourceRole::File => Some(ComponentType::File),
            ResourceRole::Directory => Some(ComponentType::Directory),
            ResourceRole::Module => Some(ComponentType::Module),
            ResourceRole::Project => Some(ComponentType::Project),
            ResourceRole::Library | ResourceRole::View | ResourceRole::SubView => None,
        }
    }
}

impl std::fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceRole::File => "file",
            ResourceRole::Directory => "directory",
            ResourceRole::Module => "module",
            ResourceRole::Project => "project",
            ResourceRole::Library => "library",
            ResourceRole::View => "view",
            ResourceRole::SubView => "subview",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    File,
    Directory,
    Module,
    Project,
}

/// A node of the in-memory component tree.
#[derive(Debug, Clone)]
pub struct Component {
    /// Identifier assigned during the analysis run.
    pub batch_id: i32,
    /// Persistent resource id, once the resource has been saved.
    pub id: Option<i64>,
    pub snapshot_id: Option<i64>,
    pub name: String,
    pub path: Option<String>,
    pub role: ResourceRole,
    pub children: Vec<Component>,
}

impl Component {
    pub fn new(batch_id: i32, name: impl Into<String>, role: ResourceRole) -> Self {
        Self {
            batch_id,
            id: None,
            snapshot_id: None,
            name: name.into(),
            path: None,
            role,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_snapshot(mut self, snapshot_id: i64) -> Self {
        self.snapshot_id = Some(snapshot_id);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_child(mut self, child: Component) -> Self {
        self.children.push(child);
        self
    }
}

/// Serialized form of a [`Component`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedComponent {
    pub batch_id: i32,
    pub id: Option<i64>,
    pub snapshot_id: Option<i64>,
    pub name: String,
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportedComponent>,
}

impl ExportedComponent {
    /// Converts a tree, failing on the first node with an unknown role.
    pub fn from_component(component: &Component) -> Result<Self, ExportError> {
        let component_type =
            component
                .role
                .component_type()
                .ok_or_else(|| ExportError::Classification {
                    name: component.name.clone(),
                    role: component.role.to_string(),
                })?;

        let children = component
            .children
            .iter()
            .map(ExportedComponent::from_component)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            batch_id: component.batch_id,
            id: component.id,
            snapshot_id: component.snapshot_id,
            name: component.name.clone(),
            path: component.path.clone(),
            component_type,
            children,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentsDocument {
    pub root: ExportedComponent,
}

/// Reads a `components.json` written by [`ComponentsPublisher`].
pub fn read_components(path: &Path) -> Result<ComponentsDocument, ExportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

pub struct ComponentsPublisher {
    root: Component,
}

impl ComponentsPublisher {
    pub fn new(root: Component) -> Self {
        Self { root }
    }
}

impl ReportPublisher for ComponentsPublisher {
    fn export(&self, report_dir: &Path) -> Result<PathBuf, ExportError> {
        let _span = tracing::debug_span!("export.components", root = %self.root.name).entered();

        // Build the whole document first so a bad node aborts before any write.
        let document = ComponentsDocument {
            root: ExportedComponent::from_component(&self.root)?,
        };
        let json = serde_json::to_string_pretty(&document)?;

        let path = report_dir.join(COMPONENTS_FILE);
        std::fs::write(&path, json).map_err(|e| ExportError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree() -> Component {
        Component::new(1, "My Project", ResourceRole::Project)
            .with_id(10)
            .with_snapshot(100)
            .with_child(
                Component::new(2, "core", ResourceRole::Module)
                    .with_id(11)
                    .with_snapshot(101)
                    .with_path("core")
                    .with_child(
                        Component::new(3, "src", ResourceRole::Directory)
                            .with_id(12)
                            .with_snapshot(102)
                            .with_path("src")
                            .with_child(
                                Component::new(4, "Foo.java", ResourceRole::File)
                                    .with_id(13)
                                    .with_snapshot(103)
                                    .with_path("src/Foo.java"),
                            ),
                    ),
            )
    }

    #[test]
    fn test_export_writes_components_json() {
        let dir = TempDir::new().unwrap();
        let path = ComponentsPublisher::new(sample_tree())
            .export(dir.path())
            .unwrap();
        assert_eq!(path, dir.path().join(COMPONENTS_FILE));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let root = &json["root"];
        assert_eq!(root["batchId"], 1);
        assert_eq!(root["id"], 10);
        assert_eq!(root["snapshotId"], 100);
        assert_eq!(root["name"], "My Project");
        assert_eq!(root["type"], "PROJECT");

        let module = &root["children"][0];
        assert_eq!(module["type"], "MODULE");
        let directory = &module["children"][0];
        assert_eq!(directory["type"], "DIRECTORY");
        let file = &directory["children"][0];
        assert_eq!(file["type"], "FILE");
        assert_eq!(file["path"], "src/Foo.java");
        assert!(file.get("children").is_none());
    }

    #[test]
    fn test_export_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = ComponentsPublisher::new(sample_tree())
            .export(dir.path())
            .unwrap();

        let document = read_components(&path).unwrap();
        assert_eq!(document.root.component_type, ComponentType::Project);
        assert_eq!(document.root.children[0].children[0].children[0].name, "Foo.java");
    }

    #[test]
    fn test_export_is_deterministic() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let publisher = ComponentsPublisher::new(sample_tree());

        let a = std::fs::read(publisher.export(first.path()).unwrap()).unwrap();
        let b = std::fs::read(publisher.export(second.path()).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_role_aborts_export() {
        let dir = TempDir::new().unwrap();
        let tree = sample_tree().with_child(Component::new(9, "commons-io", ResourceRole::Library));

        let err = ComponentsPublisher::new(tree)
            .export(dir.path())
            .unwrap_err();
        match err {
            ExportError::Classification { name, role } => {
                assert_eq!(name, "commons-io");
                assert_eq!(role, "library");
            }
            other => panic!("expected Classification, got {:?}", other),
        }
        assert!(!dir.path().join(COMPONENTS_FILE).exists());
    }

    #[test]
    fn test_only_four_roles_classify() {
        assert!(ResourceRole::View.component_type().is_none());
        assert!(ResourceRole::SubView.component_type().is_none());
        assert_eq!(
            ResourceRole::Module.component_type(),
            Some(ComponentType::Module)
        );
    }
}
