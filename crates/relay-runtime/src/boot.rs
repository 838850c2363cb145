//! Route table boot.
//!
//! The table is populated exactly once, either by running registration or by
//! loading a cache artifact written by an earlier run.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use relay_framework::routing::cache;
use relay_framework::{CacheError, RegistrationError, RouteCollection, RouteRegistrar};

use crate::config::RoutingConfig;
use crate::error::BootError;

/// The route collection an application boots with.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: OnceLock<Arc<RouteCollection>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the table by running `register` against a fresh registrar.
    pub fn rebuild<F>(&self, register: F) -> Result<Arc<RouteCollection>, BootError>
    where
        F: FnOnce(&mut RouteRegistrar) -> Result<(), RegistrationError>,
    {
        if self.is_populated() {
            return Err(BootError::AlreadyPopulated);
        }
        let mut registrar = RouteRegistrar::new();
        register(&mut registrar)?;
        let routes = registrar.finish()?;
        info!(routes = routes.len(), "route table rebuilt");
        self.populate(routes)
    }

    /// Populates the table from a cache artifact on disk.
    pub fn load_from_cache(&self, path: impl AsRef<Path>) -> Result<Arc<RouteCollection>, BootError> {
        let path = path.as_ref();
        if self.is_populated() {
            return Err(BootError::AlreadyPopulated);
        }
        let bytes = std::fs::read(path).map_err(|source| BootError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let routes = self.load_from_bytes(&bytes)?;
        info!(path = %path.display(), routes = routes.len(), "route table loaded from cache");
        Ok(routes)
    }

    /// Populates the table from an in-memory cache artifact.
    pub fn load_from_bytes(&self, bytes: &[u8]) -> Result<Arc<RouteCollection>, BootError> {
        if self.is_populated() {
            return Err(BootError::AlreadyPopulated);
        }
        let routes = cache::deserialize(bytes)?;
        self.populate(routes)
    }

    /// Writes the populated table as a cache artifact.
    pub fn write_cache(&self, path: impl AsRef<Path>) -> Result<(), BootError> {
        let path = path.as_ref();
        let bytes = cache::serialize(self.routes()?)?;
        let io_err = |source| BootError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, bytes).map_err(io_err)?;
        debug!(path = %path.display(), "route cache written");
        Ok(())
    }

    /// Boots according to configuration.
    ///
    /// With `use_cache` and an existing artifact at `cache_path`, the artifact
    /// is loaded and `register` never runs. Otherwise routes are registered,
    /// and if `cache_path` is set the artifact is (re)written. A table with
    /// inline closures cannot be cached; that is logged and boot continues.
    pub fn boot<F>(&self, config: &RoutingConfig, register: F) -> Result<Arc<RouteCollection>, BootError>
    where
        F: FnOnce(&mut RouteRegistrar) -> Result<(), RegistrationError>,
    {
        if config.use_cache
            && let Some(path) = &config.cache_path
            && path.exists()
        {
            return self.load_from_cache(path);
        }

        let routes = self.rebuild(register)?;
        if let Some(path) = &config.cache_path {
            match self.write_cache(path) {
                Ok(()) => {}
                Err(BootError::Cache(CacheError::Uncacheable { route })) => {
                    warn!(%route, "route table uses inline closures and was not cached");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(routes)
    }

    pub fn get(&self) -> Option<&Arc<RouteCollection>> {
        self.routes.get()
    }

    /// The populated collection.
    pub fn routes(&self) -> Result<&Arc<RouteCollection>, BootError> {
        self.routes.get().ok_or(BootError::NotPopulated)
    }

    pub fn is_populated(&self) -> bool {
        self.routes.get().is_some()
    }

    fn populate(&self, routes: RouteCollection) -> Result<Arc<RouteCollection>, BootError> {
        let routes = Arc::new(routes);
        self.routes
            .set(Arc::clone(&routes))
            .map_err(|_| BootError::AlreadyPopulated)?;
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use relay_core::{Update, Verb};
    use relay_framework::{GroupAttributes, RouteDefinition};

    use super::*;

    fn named_routes(r: &mut RouteRegistrar) -> Result<(), RegistrationError> {
        r.group(GroupAttributes::new().prefix("/admin/").name("admin."), |r| {
            r.add(RouteDefinition::command("ban {id}").where_number("id").name("ban").named("ban"))?;
            Ok(())
        })?;
        r.add(RouteDefinition::text("ping").named("ping"))?;
        Ok(())
    }

    #[test]
    fn test_populated_once() {
        let table = RouteTable::new();
        assert!(matches!(table.routes(), Err(BootError::NotPopulated)));
        table.rebuild(named_routes).unwrap();
        assert!(matches!(table.rebuild(named_routes), Err(BootError::AlreadyPopulated)));
        assert!(matches!(table.load_from_bytes(b"{}"), Err(BootError::AlreadyPopulated)));
        assert_eq!(table.routes().unwrap().len(), 2);
    }

    #[test]
    fn test_registration_error_leaves_table_empty() {
        let table = RouteTable::new();
        let err = table
            .rebuild(|r| {
                r.push(GroupAttributes::new().prefix("x"));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, BootError::Registration(RegistrationError::UnclosedGroups(1))));
        assert!(!table.is_populated());
    }

    #[test]
    fn test_cache_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/routes.json");

        let first = RouteTable::new();
        first.rebuild(named_routes).unwrap();
        first.write_cache(&path).unwrap();

        let second = RouteTable::new();
        let routes = second.load_from_cache(&path).unwrap();
        let m = routes.match_update(&Update::text(1, "/admin/ban 7")).unwrap();
        assert_eq!(m.route.name(), Some("admin.ban"));
        assert!(routes.match_route(Verb::Command, "/admin/ban x").is_none());
    }

    #[test]
    fn test_boot_prefers_existing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = RoutingConfig {
            cache_path: Some(dir.path().join("routes.json")),
            use_cache: true,
        };

        RouteTable::new().boot(&config, named_routes).unwrap();
        assert!(dir.path().join("routes.json").exists());

        let table = RouteTable::new();
        let routes = table
            .boot(&config, |_| panic!("registration must not run with a cache present"))
            .unwrap();
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn test_boot_skips_uncacheable_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = RoutingConfig {
            cache_path: Some(dir.path().join("routes.json")),
            use_cache: false,
        };
        let table = RouteTable::new();
        table
            .boot(&config, |r| {
                r.text("hi", || async { "hello" })?;
                Ok(())
            })
            .unwrap();
        assert!(table.is_populated());
        assert!(!dir.path().join("routes.json").exists());
    }

    #[test]
    fn test_missing_cache_file() {
        let err = RouteTable::new().load_from_cache("/no/such/routes.json").unwrap_err();
        assert!(matches!(err, BootError::Io { .. }));
    }
}
