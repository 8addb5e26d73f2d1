//! Filesystem input and output for the CLI.

use anyhow::{Context, Result, bail};
use directories_next::BaseDirs;
use pipekit_builder::ManifestSink;
use pipekit_builder::ManifestTree;
use pipekit_builder::paths::{KUSTOMIZATION, MANIFEST_PATH, SECRETS_DIR};
use pipekit_core::manifest::Manifest;
use pipekit_core::{Error, Plaintext};
use pipekit_resources::{Kustomization, SealedSecret};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes each document to its own file below `root`.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ManifestSink for DirectorySink {
    fn write(&mut self, path: &str, document: &str) -> pipekit_core::Result<()> {
        let target = self.root.join(path);
        let write_error = |e: std::io::Error| Error::Write {
            path: target.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&target, document).map_err(write_error)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => return PathBuf::from(path),
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

/// Read a dockerconfigjson file, checking that it holds a JSON object.
pub fn load_docker_config(path: &str) -> Result<Plaintext> {
    let path = expand_home(path);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read docker config: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Docker config is not valid JSON: {}", path.display()))?;
    if !value.is_object() {
        bail!("Docker config must be a JSON object: {}", path.display());
    }
    Ok(Plaintext::new(content))
}

/// Read a persisted descriptor, if there is one.
fn load_manifest(path: &Path) -> Result<Option<Manifest>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    Ok(Some(Manifest::from_yaml(&content)?))
}

/// Load the descriptor, every kustomization and every sealed secret of a
/// bootstrapped repository.
pub fn load_tree(root: &Path) -> Result<ManifestTree> {
    let manifest_path = root.join(MANIFEST_PATH);
    let manifest = load_manifest(&manifest_path)?
        .with_context(|| format!("No manifest found at {}", manifest_path.display()))?;

    let mut tree = ManifestTree::new();
    tree.insert(MANIFEST_PATH, manifest);

    let environments = root.join("environments");
    if environments.is_dir() {
        load_dir(root, &environments, &mut tree)?;
    }
    debug!(files = tree.len(), root = %root.display(), "Loaded repository");
    Ok(tree)
}

fn load_dir(root: &Path, dir: &Path, tree: &mut ManifestTree) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    let in_secrets = dir.file_name().is_some_and(|n| n == SECRETS_DIR);
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            load_dir(root, &path, tree)?;
        } else if path.file_name().is_some_and(|n| n == KUSTOMIZATION) {
            let kustomization: Kustomization = read_yaml(&path)?;
            tree.insert(tree_path(root, &path)?, kustomization);
        } else if in_secrets && path.extension().is_some_and(|e| e == "yaml") {
            let sealed: SealedSecret = read_yaml(&path)?;
            tree.insert(tree_path(root, &path)?, sealed);
        }
    }
    Ok(())
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Path of `file` relative to `root`, `/`-separated.
fn tree_path(root: &Path, file: &Path) -> Result<String> {
    let rel = file
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", file.display(), root.display()))?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
