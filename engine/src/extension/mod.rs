//! Custom Extension Loader
//!
//! Resolves the functions named by `custom_file` transformation steps. A function is
//! identified by `(file path, function name)`:
//!
//! 1. In-process functions registered with [`ExtensionRegistry::register_native`] are
//!    consulted first.
//! 2. Otherwise the file is loaded from disk as a WebAssembly module (see [`wasm`]).
//!    Nothing is cached: every resolution reads the file again.
//!
//! Relative paths are resolved against the current working directory.

pub mod wasm;

use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ExtensionResult;
use crate::models::Value;

pub use wasm::WasmExtension;

/// Signature of an in-process extension function.
///
/// Receives the input columns (in step order) and the step's keyword parameters and
/// returns the output column.
pub type NativeFn =
    dyn Fn(&[&[Value]], &Map<String, JsonValue>) -> ExtensionResult<Vec<Value>> + Send + Sync;

/// A resolved, callable extension function.
pub trait ExtensionFunction {
    /// Name the function was resolved under
    fn name(&self) -> &str;

    /// Compute one output column from `columns` and keyword `parameters`.
    fn invoke(
        &mut self,
        columns: &[&[Value]],
        parameters: &Map<String, JsonValue>,
    ) -> ExtensionResult<Vec<Value>>;
}

struct NativeExtension {
    name: String,
    func: Arc<NativeFn>,
}

impl ExtensionFunction for NativeExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(
        &mut self,
        columns: &[&[Value]],
        parameters: &Map<String, JsonValue>,
    ) -> ExtensionResult<Vec<Value>> {
        (self.func)(columns, parameters)
    }
}

/// Lookup table for extension functions.
#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    natives: HashMap<(PathBuf, String), Arc<NativeFn>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-process function under `(path, function)`.
    ///
    /// A later registration for the same key replaces the earlier one.
    pub fn register_native<F>(&mut self, path: impl AsRef<Path>, function: impl Into<String>, func: F)
    where
        F: Fn(&[&[Value]], &Map<String, JsonValue>) -> ExtensionResult<Vec<Value>> + Send + Sync + 'static,
    {
        self.natives
            .insert((resolve_path(path), function.into()), Arc::new(func));
    }

    /// Resolve `function` from the extension at `path`.
    pub fn resolve(&self, path: &str, function: &str) -> ExtensionResult<Box<dyn ExtensionFunction>> {
        let resolved = resolve_path(path);

        if let Some(func) = self.natives.get(&(resolved.clone(), function.to_string())) {
            return Ok(Box::new(NativeExtension {
                name: function.to_string(),
                func: Arc::clone(func),
            }));
        }

        Ok(Box::new(WasmExtension::load(&resolved, function)?))
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("natives", &self.natives.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Absolute form of `path`, joined onto the current directory when relative.
pub fn resolve_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
