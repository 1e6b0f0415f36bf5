use crate::{Driver, Error, ErrorKind, LoaderConfig, Result, loader::load_module};
use libloading::Library;
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock},
};

/// Resolves backend names to their operations.
///
/// Statically registered drivers take precedence, every other name is
/// searched as a loadable module. The registry also counts the live handles
/// of each backend to drive [`Driver::setup`] and [`Driver::teardown`].
///
/// Cloning is cheap, clones share the same state.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    config: RwLock<LoaderConfig>,
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    // One counter per backend, setup and teardown run under that counter's lock only.
    active: Mutex<HashMap<String, Arc<Mutex<usize>>>>,
}

impl Registry {
    pub fn new(config: LoaderConfig) -> Self {
        let registry = Self::default();
        registry.set_config(config);
        registry
    }

    /// Process wide registry used by [`Handle::init`](crate::Handle::init),
    /// configured from the environment on first use.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| Registry::new(LoaderConfig::from_env()))
    }

    pub fn config(&self) -> LoaderConfig {
        match self.inner.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_config(&self, config: LoaderConfig) {
        match self.inner.config.write() {
            Ok(mut current) => *current = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    /// Make a driver available under `name` without loading any module.
    /// Returns the driver previously registered under the same name.
    pub fn register(&self, name: impl Into<String>, driver: Arc<dyn Driver>) -> Option<Arc<dyn Driver>> {
        let name = name.into();
        log::debug!("Registering backend `{}`", name);
        self.drivers_mut().insert(name, driver)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers_mut().remove(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.drivers().contains_key(name)
    }

    /// Number of live handles of the backend.
    pub fn active_handles(&self, name: &str) -> usize {
        let Some(counter) = self.active().get(name).cloned() else {
            return 0;
        };
        let count = *lock(&counter);
        count
    }

    /// Resolve `backend` to its module.
    pub fn open(&self, backend: &str) -> Result<Module> {
        if backend.is_empty() {
            return Err(Error::with_detail(
                ErrorKind::InvalidParam,
                "The backend name is empty",
            ));
        }
        if let Some(driver) = self.drivers().get(backend).cloned() {
            return Ok(Module {
                name: backend.into(),
                driver: Some(driver),
                library: None,
            });
        }
        let (library, driver) = load_module(&self.config(), backend)?;
        Ok(Module {
            name: backend.into(),
            driver: Some(driver),
            library: Some(library),
        })
    }

    /// Account a new handle of the module, the first one sets the backend up.
    pub(crate) fn acquire(&self, module: &Module) -> Result<()> {
        let counter = self.counter(&module.name);
        let mut count = lock(&counter);
        if *count == 0 {
            log::debug!("Setting up backend `{}`", module.name);
            module.driver()?.setup().map_err(Error::detach)?;
        }
        *count += 1;
        Ok(())
    }

    /// Release a handle accounted by `acquire`, the last one tears the backend down.
    pub(crate) fn release(&self, module: &Module) {
        let counter = self.counter(&module.name);
        let mut count = lock(&counter);
        if *count == 0 {
            log::warn!("Releasing backend `{}` that has no live handle", module.name);
            return;
        }
        *count -= 1;
        if *count == 0 {
            log::debug!("Tearing down backend `{}`", module.name);
            if let Ok(driver) = module.driver() {
                driver.teardown();
            }
        }
    }

    fn drivers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn Driver>>> {
        self.inner
            .drivers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn drivers_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn Driver>>> {
        self.inner
            .drivers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn counter(&self, name: &str) -> Arc<Mutex<usize>> {
        self.active().entry(name.to_string()).or_default().clone()
    }

    fn active(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<usize>>>> {
        lock(&self.inner.active)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config())
            .field("drivers", &self.drivers().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A resolved backend: its driver and, for loaded modules, the library
/// keeping the driver code mapped.
pub struct Module {
    name: String,
    // Declared before `library`, the driver must be dropped first.
    driver: Option<Arc<dyn Driver>>,
    library: Option<Library>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> Result<&Arc<dyn Driver>> {
        self.driver
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::InvalidHandle))
    }

    /// Whether the module was loaded from a dynamic library.
    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    /// Unload the module. A failure to unload is reported, the module is gone anyway.
    pub fn close(mut self) -> Result<()> {
        self.driver.take();
        let Some(library) = self.library.take() else {
            return Ok(());
        };
        library.close().map_err(|e| {
            let error = Error::with_detail(
                ErrorKind::InvalidParam,
                format!("Unloading backend module `{}` failed: {}", self.name, e),
            );
            log::error!("{:#}", error);
            error
        })
    }
}

impl Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        self.driver.take();
    }
}
