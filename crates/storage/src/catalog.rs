//! Quiz content as data.
//!
//! Each module is one TOML document (see `catalog/*.toml` for the built-in
//! set). Built-ins are embedded at compile time; extra modules can be loaded
//! from a directory at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quiz_core::model::{ModuleDraft, ModuleError, ModuleId, QuizModule};
use thiserror::Error;
use tracing::{debug, info, warn};

const BUILTIN: &[(&str, &str)] = &[
    (
        "avoiding_panic_decisions.toml",
        include_str!("../catalog/avoiding_panic_decisions.toml"),
    ),
    (
        "budgeting_basics.toml",
        include_str!("../catalog/budgeting_basics.toml"),
    ),
    (
        "online_safety_awareness.toml",
        include_str!("../catalog/online_safety_awareness.toml"),
    ),
];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{name}: {source}")]
    Invalid {
        name: String,
        #[source]
        source: ModuleError,
    },

    #[error("duplicate module id: {0}")]
    DuplicateId(ModuleId),
}

/// Parse and validate one module document. `name` is only used in errors.
///
/// # Errors
///
/// Returns `CatalogError::Parse` for malformed TOML and
/// `CatalogError::Invalid` if the module fails validation.
pub fn parse_module(name: &str, src: &str) -> Result<QuizModule, CatalogError> {
    let draft: ModuleDraft = toml::from_str(src).map_err(|source| CatalogError::Parse {
        name: name.to_owned(),
        source,
    })?;
    draft.validate().map_err(|source| CatalogError::Invalid {
        name: name.to_owned(),
        source,
    })
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CatalogError {
    let path = path.to_path_buf();
    move |source| CatalogError::Io { path, source }
}

/// Ordered, id-indexed set of modules.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    modules: Vec<Arc<QuizModule>>,
    index: HashMap<ModuleId, usize>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The modules shipped with the binary.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if an embedded document is invalid or ids collide.
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for (name, src) in BUILTIN {
            let module = parse_module(name, src)?;
            let id = module.id().clone();
            if !catalog.insert(module) {
                return Err(CatalogError::DuplicateId(id));
            }
        }
        debug!(modules = catalog.len(), "built-in catalog loaded");
        Ok(catalog)
    }

    /// Add a module. Returns `false` and keeps the existing entry if the id is taken.
    pub fn insert(&mut self, module: QuizModule) -> bool {
        if self.index.contains_key(module.id()) {
            return false;
        }
        self.index.insert(module.id().clone(), self.modules.len());
        self.modules.push(Arc::new(module));
        true
    }

    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<Arc<QuizModule>> {
        self.index.get(id).map(|&i| Arc::clone(&self.modules[i]))
    }

    #[must_use]
    pub fn modules(&self) -> &[Arc<QuizModule>] {
        &self.modules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Load every `*.toml` file in `dir` (sorted by file name).
    ///
    /// Files that fail to parse or validate, and ids already present, are
    /// logged and skipped. Returns the number of modules added.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the directory or a file cannot be read.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, CatalogError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
            let path = entry.map_err(io_error(dir))?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut added = 0;
        for path in paths {
            let src = std::fs::read_to_string(&path).map_err(io_error(&path))?;
            let name = path.display().to_string();
            match parse_module(&name, &src) {
                Ok(module) => {
                    let id = module.id().clone();
                    if self.insert(module) {
                        added += 1;
                    } else {
                        warn!(path = %name, module_id = %id, "module id already loaded, skipping");
                    }
                }
                Err(err) => {
                    warn!(path = %name, error = %err, "skipping invalid module file");
                }
            }
        }

        info!(dir = %dir.display(), added, "catalog directory loaded");
        Ok(added)
    }
}
