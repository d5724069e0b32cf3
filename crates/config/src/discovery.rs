//! Finding pipeline files and resolving `file::pipeline` references.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ConfigError;
use crate::file::PipelineFile;

const EXTENSIONS: &[&str] = &["yaml", "yml", "toml"];

/// A pipeline file together with the label it is addressed by.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File stem, used in `file::pipeline` references
    pub label: String,
    pub path: PathBuf,
    pub file: PipelineFile,
}

/// Map every config file under `path` to its label (the file stem).
///
/// `path` may be a single file or a directory; directories are scanned one
/// level deep. Labels are sorted; later extensions do not overwrite an
/// earlier file with the same stem.
pub fn discover_configs(path: &Path) -> Result<BTreeMap<String, PathBuf>, ConfigError> {
    let mut configs = BTreeMap::new();

    if path.is_file() {
        configs.insert(label_of(path), path.to_path_buf());
        return Ok(configs);
    }
    if !path.is_dir() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_config_extension(p))
        .collect();
    files.sort_by_key(|p| (extension_rank(p), p.clone()));

    for file in files {
        configs.entry(label_of(&file)).or_insert(file);
    }

    tracing::debug!(path = %path.display(), files = configs.len(), "Discovered pipeline files");
    Ok(configs)
}

/// Load one pipeline file, choosing the parser by extension.
pub fn load_config(path: &Path) -> Result<PipelineFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let parsed = if path.extension().is_some_and(|ext| ext == "toml") {
        PipelineFile::from_toml(&content)
    } else {
        PipelineFile::from_yaml(&content)
    };

    let mut file = parsed.map_err(|e| match e {
        ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    file.path = Some(path.to_path_buf());
    Ok(file)
}

/// Load every discovered file. A file that fails to load does not prevent
/// the others from loading.
pub fn load_all_configs(
    path: &Path,
) -> Result<Vec<(String, Result<LoadedConfig, ConfigError>)>, ConfigError> {
    let configs = discover_configs(path)?;
    Ok(configs
        .into_iter()
        .map(|(label, file_path)| {
            let loaded = load_config(&file_path).map(|file| LoadedConfig {
                label: label.clone(),
                path: file_path,
                file,
            });
            (label, loaded)
        })
        .collect())
}

/// Resolve `file::pipeline` or a bare, unambiguous `pipeline` name.
pub fn resolve_pipeline(
    config_path: &Path,
    reference: &str,
) -> Result<(LoadedConfig, String), ConfigError> {
    if let Some((label, pipeline)) = reference.split_once("::") {
        let configs = discover_configs(config_path)?;
        let file_path = configs.get(label).ok_or_else(|| ConfigError::FileNotFound {
            label: label.to_string(),
            available: configs.keys().cloned().collect::<Vec<_>>().join(", "),
        })?;
        let file = load_config(file_path)?;
        if !file.pipelines.contains_key(pipeline) {
            return Err(ConfigError::PipelineNotFound {
                name: reference.to_string(),
                available: file.pipeline_names().join(", "),
            });
        }
        let loaded = LoadedConfig {
            label: label.to_string(),
            path: file_path.clone(),
            file,
        };
        return Ok((loaded, pipeline.to_string()));
    }

    let mut matches = Vec::new();
    for (label, loaded) in load_all_configs(config_path)? {
        match loaded {
            Ok(loaded) if loaded.file.pipelines.contains_key(reference) => matches.push(loaded),
            Ok(_) => {}
            Err(e) => tracing::warn!(file = %label, error = %e, "Skipping unreadable pipeline file"),
        }
    }

    match matches.len() {
        0 => Err(ConfigError::PipelineNotFound {
            name: reference.to_string(),
            available: String::new(),
        }),
        1 => Ok((matches.remove(0), reference.to_string())),
        _ => Err(ConfigError::Ambiguous {
            name: reference.to_string(),
            files: matches.iter().map(|m| m.label.clone()).collect(),
        }),
    }
}

fn label_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_config_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e))
}

fn extension_rank(path: &Path) -> usize {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| EXTENSIONS.iter().position(|known| *known == e))
        .unwrap_or(EXTENSIONS.len())
}
