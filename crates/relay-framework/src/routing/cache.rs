//! The cached route registry artifact.
//!
//! A collection whose routes reference handlers and middleware by name can be
//! written out once and loaded at boot instead of re-running registration.
//! Routes with inline closures cannot be cached.
//!
//! The artifact is versioned JSON; loading re-validates every pattern and
//! re-indexes names, so a loaded collection behaves exactly like the one that
//! was written.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::collection::RouteCollection;
use super::route::Route;
use crate::error::CacheError;

/// Bumped whenever the artifact layout changes.
pub const CACHE_VERSION: u32 = 1;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    version: u32,
    routes: Vec<&'a Route>,
}

#[derive(Deserialize)]
struct Artifact {
    version: u32,
    routes: Vec<Route>,
}

/// Serializes `routes` into a cache artifact.
pub fn serialize(routes: &RouteCollection) -> Result<Vec<u8>, CacheError> {
    if let Some(route) = routes.iter().find(|r| !r.is_cacheable()) {
        return Err(CacheError::Uncacheable {
            route: route.identifier().to_string(),
        });
    }
    let artifact = ArtifactRef {
        version: CACHE_VERSION,
        routes: routes.iter().map(AsRef::as_ref).collect(),
    };
    let bytes = serde_json::to_vec_pretty(&artifact)?;
    debug!(routes = routes.len(), bytes = bytes.len(), "route cache serialized");
    Ok(bytes)
}

/// Loads a collection from a cache artifact.
pub fn deserialize(bytes: &[u8]) -> Result<RouteCollection, CacheError> {
    let artifact: Artifact = serde_json::from_slice(bytes)?;
    if artifact.version != CACHE_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: CACHE_VERSION,
            found: artifact.version,
        });
    }
    let mut routes = RouteCollection::new();
    for route in artifact.routes {
        routes.register(route)?;
    }
    debug!(routes = routes.len(), "route cache loaded");
    Ok(routes)
}
