use crate::{Driver, ENTRY_POINT, EntryPoint, Error, ErrorKind, Result};
use libloading::Library;
use std::{
    env::{
        self,
        consts::{DLL_PREFIX, DLL_SUFFIX},
    },
    path::PathBuf,
    sync::Arc,
};

/// Longest fully qualified module path accepted.
pub const MAX_PATH_LEN: usize = 1023;

/// Environment variable overriding the directory backend modules are installed in.
pub const LIBRARY_PATH_VAR: &str = "DBX_LIBRARY_PATH";

const DEFAULT_LIBRARY_DIR: &str = match option_env!("DBX_LIBDIR") {
    Some(dir) => dir,
    None => "/usr/local/lib/dbx",
};

/// Where and under which names backend modules are searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub library_dir: PathBuf,
    pub prefix: String,
    pub suffix: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            library_dir: DEFAULT_LIBRARY_DIR.into(),
            prefix: DLL_PREFIX.into(),
            suffix: DLL_SUFFIX.into(),
        }
    }
}

impl LoaderConfig {
    /// Default configuration with the library directory taken from
    /// `DBX_LIBRARY_PATH` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env::var_os(LIBRARY_PATH_VAR).filter(|v| !v.is_empty()) {
            config.library_dir = dir.into();
        }
        config
    }

    /// Module file name of a backend: `<prefix><backend>backend<suffix>`.
    pub fn module_file_name(&self, backend: &str) -> String {
        format!("{}{}backend{}", self.prefix, backend, self.suffix)
    }

    /// Paths tried in order: the name as given, the module file name and the
    /// module file name inside the library directory.
    pub fn candidates(&self, backend: &str) -> Result<[PathBuf; 3]> {
        let file_name = self.module_file_name(backend);
        let full = self.library_dir.join(&file_name);
        if full.as_os_str().len() > MAX_PATH_LEN {
            let error = Error::with_detail(
                ErrorKind::SizeMismatch,
                format!(
                    "The module path for backend `{}` is longer than {} bytes",
                    backend, MAX_PATH_LEN
                ),
            );
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok([backend.into(), file_name.into(), full])
    }
}

/// Load the first candidate that the platform loader accepts and retrieve
/// the driver through the module entry point.
pub(crate) fn load_module(
    config: &LoaderConfig,
    backend: &str,
) -> Result<(Library, Arc<dyn Driver>)> {
    let candidates = config.candidates(backend)?;
    let mut failure = None;
    let mut library = None;
    for path in &candidates {
        // Loading runs the module initializers, modules are trusted by configuration.
        match unsafe { Library::new(path) } {
            Ok(loaded) => {
                log::debug!("Loaded backend module `{}`", path.display());
                library = Some(loaded);
                break;
            }
            Err(e) => {
                log::debug!("Could not load `{}`: {}", path.display(), e);
                failure = Some(e);
            }
        }
    }
    let Some(library) = library else {
        let error = Error::with_detail(
            ErrorKind::NotFound,
            format!(
                "Loading backend library {}, {} or {} failed ({})",
                candidates[0].display(),
                candidates[1].display(),
                candidates[2].display(),
                failure.map(|e| e.to_string()).unwrap_or_default(),
            ),
        );
        log::error!("{:#}", error);
        return Err(error);
    };
    let mut ops: Option<Arc<dyn Driver>> = None;
    unsafe {
        let entry = match library.get::<EntryPoint>(ENTRY_POINT.as_bytes()) {
            Ok(entry) => entry,
            Err(e) => {
                let error = Error::with_detail(
                    ErrorKind::NoOp,
                    format!("Backend module `{}` has no `{}`: {}", backend, ENTRY_POINT, e),
                );
                log::error!("{:#}", error);
                return Err(error);
            }
        };
        entry(&mut ops);
    }
    match ops {
        Some(driver) => Ok((library, driver)),
        None => {
            let error = Error::with_detail(
                ErrorKind::NoOp,
                format!("Backend module `{}` did not register any operation", backend),
            );
            log::error!("{:#}", error);
            Err(error)
        }
    }
}
