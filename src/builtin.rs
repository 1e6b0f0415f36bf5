use dbx_core::Registry;
use std::sync::Once;

/// Register the backends compiled into this crate into `registry`.
pub fn install_builtin(registry: &Registry) {
    #[cfg(feature = "sqlite")]
    dbx_sqlite::register(registry);
    #[cfg(not(feature = "sqlite"))]
    let _ = registry;
}

/// Install the built-in backends into [`Registry::global`], only the first call does anything.
pub fn install_global() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::debug!("Installing the built-in backends");
        install_builtin(Registry::global());
    });
}
