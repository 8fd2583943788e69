use crate::{ConfigError, ModuleConfig, ModulePath, ModuleTree};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE_PATTERN: &str = "*.tf.json";

impl ModuleTree {
    /// Load the module in `dir` and every local module it calls.
    ///
    /// All `*.tf.json` files in a directory form one module; they are read in
    /// file-name order and merged. Module sources must be relative paths.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut stack = Vec::new();
        load_module(dir.as_ref(), "root", ModulePath::root(), &mut stack)
    }
}

fn load_module(
    dir: &Path,
    name: &str,
    path: ModulePath,
    stack: &mut Vec<PathBuf>,
) -> Result<ModuleTree, ConfigError> {
    let canonical = dir.canonicalize().map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    if stack.contains(&canonical) {
        return Err(ConfigError::module(
            &path,
            format!("module source '{}' includes itself", dir.display()),
        ));
    }

    let mut config = ModuleConfig::default();
    for file in config_files(dir)? {
        debug!(file = %file.display(), module = %path, "loading configuration file");
        config.merge(read_config_file(&file, &path)?);
    }

    stack.push(canonical);
    let mut children = std::collections::BTreeMap::new();
    for call in &config.modules {
        if !(call.source.starts_with("./") || call.source.starts_with("../")) {
            return Err(ConfigError::module(
                &path,
                format!(
                    "module '{}': only local sources are supported, got '{}'",
                    call.name, call.source
                ),
            ));
        }
        let child = load_module(
            &dir.join(&call.source),
            &call.name,
            path.child(call.name.clone()),
            stack,
        )?;
        children.insert(call.name.clone(), child);
    }
    stack.pop();

    Ok(ModuleTree {
        name: name.to_string(),
        path,
        config,
        children,
    })
}

fn config_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let pattern = format!(
        "{}/{CONFIG_FILE_PATTERN}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let file = entry.map_err(|error| ConfigError::Io {
            path: error.path().to_path_buf(),
            source: error.into_error(),
        })?;
        if file.is_file() {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

fn read_config_file(file: &Path, module: &ModulePath) -> Result<ModuleConfig, ConfigError> {
    let source = std::fs::read_to_string(file).map_err(|source| ConfigError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&source).map_err(|source| ConfigError::Json {
        path: file.to_path_buf(),
        source,
    })?;
    ModuleConfig::from_json_value(&value).map_err(|error| match error {
        ConfigError::InvalidModule { problems, .. } => ConfigError::InvalidModule {
            path: format!("{module} ({})", file.display()),
            problems,
        },
        other => other,
    })
}
