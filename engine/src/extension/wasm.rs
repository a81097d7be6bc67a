//! WebAssembly extensions, executed with wasmi.
//!
//! Modules are sandboxed: no host functions are linked, so a module that imports
//! anything fails to instantiate. The calling convention is chosen from the exported
//! function's signature.
//!
//! # Scalar
//!
//! `(f64, ...) -> f64`, called once per row with the row's input values followed by
//! the numeric keyword parameters in configuration order:
//!
//! ```wat
//! (module
//!   (func (export "convert_to_usd") (param $amount f64) (param $rate f64) (result f64)
//!     (f64.mul (local.get $amount) (local.get $rate))))
//! ```
//!
//! A row with a missing input produces `Null` without calling the function.
//! Timestamps are passed as Unix seconds, durations as seconds, booleans as 0/1.
//!
//! # Columnar
//!
//! `(i32 ptr, i32 len) -> i64`. The module exports `memory` and
//! `alloc(i32) -> i32`. The host writes
//! `{"columns": [[...], ...], "parameters": {...}}` as UTF-8 JSON into a buffer
//! obtained from `alloc`; the function returns `(ptr << 32) | len` of a JSON array
//! holding the output column.
//!
//! Every call into the module runs on a fresh fuel budget, so a looping extension
//! fails with an execution error instead of hanging the pipeline.

use serde_json::{json, Map, Number, Value as JsonValue};
use std::path::{Path, PathBuf};
use wasmi::{Engine, Func, Instance, Linker, Module, Store, TypedFunc, ValType};

use super::ExtensionFunction;
use crate::error::{ExtensionError, ExtensionResult};
use crate::models::{duration_seconds, Value};

/// Largest scalar arity supported.
const MAX_SCALAR_ARITY: usize = 6;

/// Fuel granted to each call into a module.
pub const DEFAULT_FUEL_PER_CALL: u64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Convention {
    Scalar { arity: usize },
    Columnar,
}

impl Convention {
    fn detect(params: &[ValType], results: &[ValType]) -> Option<Self> {
        if results == [ValType::F64]
            && (1..=MAX_SCALAR_ARITY).contains(&params.len())
            && params.iter().all(|t| *t == ValType::F64)
        {
            return Some(Convention::Scalar { arity: params.len() });
        }
        if params == [ValType::I32, ValType::I32] && results == [ValType::I64] {
            return Some(Convention::Columnar);
        }
        None
    }
}

/// Typed handle for each supported scalar arity.
enum ScalarFn {
    A1(TypedFunc<f64, f64>),
    A2(TypedFunc<(f64, f64), f64>),
    A3(TypedFunc<(f64, f64, f64), f64>),
    A4(TypedFunc<(f64, f64, f64, f64), f64>),
    A5(TypedFunc<(f64, f64, f64, f64, f64), f64>),
    A6(TypedFunc<(f64, f64, f64, f64, f64, f64), f64>),
}

impl ScalarFn {
    fn new(func: &Func, store: &Store<()>, arity: usize) -> Result<Self, wasmi::Error> {
        Ok(match arity {
            1 => ScalarFn::A1(func.typed(store)?),
            2 => ScalarFn::A2(func.typed(store)?),
            3 => ScalarFn::A3(func.typed(store)?),
            4 => ScalarFn::A4(func.typed(store)?),
            5 => ScalarFn::A5(func.typed(store)?),
            _ => ScalarFn::A6(func.typed(store)?),
        })
    }

    fn call(&self, store: &mut Store<()>, a: &[f64]) -> Result<f64, wasmi::Error> {
        match self {
            ScalarFn::A1(f) => f.call(store, a[0]),
            ScalarFn::A2(f) => f.call(store, (a[0], a[1])),
            ScalarFn::A3(f) => f.call(store, (a[0], a[1], a[2])),
            ScalarFn::A4(f) => f.call(store, (a[0], a[1], a[2], a[3])),
            ScalarFn::A5(f) => f.call(store, (a[0], a[1], a[2], a[3], a[4])),
            ScalarFn::A6(f) => f.call(store, (a[0], a[1], a[2], a[3], a[4], a[5])),
        }
    }
}

/// A function exported by a WebAssembly module, instantiated in its own store.
pub struct WasmExtension {
    path: PathBuf,
    function: String,
    store: Store<()>,
    instance: Instance,
    func: Func,
    convention: Convention,
    fuel_per_call: u64,
}

impl WasmExtension {
    /// Load `function` from the module at `path` (`.wasm` binary or `.wat` text).
    pub fn load(path: &Path, function: &str) -> ExtensionResult<Self> {
        if !path.is_file() {
            return Err(ExtensionError::FileNotFound { path: path.to_path_buf() });
        }
        let bytes = std::fs::read(path).map_err(|source| ExtensionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, function, &bytes)
    }

    /// Instantiate `function` from module bytes; `path` is used for diagnostics.
    pub fn from_bytes(path: &Path, function: &str, bytes: &[u8]) -> ExtensionResult<Self> {
        let invalid = |e: wasmi::Error| ExtensionError::InvalidModule {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut config = wasmi::Config::default();
        config.consume_fuel(true);
        let engine = Engine::new(&config);
        let module = Module::new(&engine, bytes).map_err(invalid)?;
        let mut store = Store::new(&engine, ());
        // Start sections run during instantiation
        store.set_fuel(DEFAULT_FUEL_PER_CALL).map_err(invalid)?;
        let linker = Linker::<()>::new(&engine);
        let instance = linker
            .instantiate_and_start(&mut store, &module)
            .map_err(invalid)?;

        let func = instance
            .get_func(&store, function)
            .ok_or_else(|| ExtensionError::FunctionNotFound {
                path: path.to_path_buf(),
                function: function.to_string(),
            })?;

        let ty = func.ty(&store);
        let convention = Convention::detect(ty.params(), ty.results()).ok_or_else(|| {
            ExtensionError::UnsupportedSignature {
                function: function.to_string(),
                signature: format!("{:?} -> {:?}", ty.params(), ty.results()),
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            function: function.to_string(),
            store,
            instance,
            func,
            convention,
            fuel_per_call: DEFAULT_FUEL_PER_CALL,
        })
    }

    /// Override the fuel granted to each call.
    pub fn with_fuel_per_call(mut self, fuel: u64) -> Self {
        self.fuel_per_call = fuel;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_columnar(&self) -> bool {
        self.convention == Convention::Columnar
    }

    fn execution(&self, message: impl std::fmt::Display) -> ExtensionError {
        ExtensionError::Execution {
            function: self.function.clone(),
            message: message.to_string(),
        }
    }

    fn refuel(&mut self) -> ExtensionResult<()> {
        let fuel = self.fuel_per_call;
        self.store.set_fuel(fuel).map_err(|e| self.execution(e))
    }

    fn invalid_argument(&self, message: String) -> ExtensionError {
        ExtensionError::InvalidArgument {
            function: self.function.clone(),
            message,
        }
    }

    fn invoke_scalar(
        &mut self,
        arity: usize,
        columns: &[&[Value]],
        parameters: &Map<String, JsonValue>,
    ) -> ExtensionResult<Vec<Value>> {
        let mut trailing = Vec::with_capacity(parameters.len());
        for (key, value) in parameters {
            let number = value
                .as_f64()
                .ok_or_else(|| self.invalid_argument(format!("parameter '{key}' is not numeric")))?;
            trailing.push(number);
        }

        let supplied = columns.len() + trailing.len();
        if supplied != arity {
            return Err(self.invalid_argument(format!(
                "expects {arity} arguments, got {} columns and {} parameters",
                columns.len(),
                trailing.len()
            )));
        }

        let typed = ScalarFn::new(&self.func, &self.store, arity).map_err(|e| self.execution(e))?;
        let rows = columns.first().map_or(0, |c| c.len());
        let mut output = Vec::with_capacity(rows);
        let mut args = Vec::with_capacity(arity);

        'rows: for row in 0..rows {
            args.clear();
            for column in columns {
                match scalar_arg(&column[row]) {
                    Ok(Some(x)) => args.push(x),
                    Ok(None) => {
                        output.push(Value::Null);
                        continue 'rows;
                    }
                    Err(kind) => {
                        return Err(self.invalid_argument(format!(
                            "cannot pass {kind} value at row {row}"
                        )))
                    }
                }
            }
            args.extend_from_slice(&trailing);

            self.refuel()?;
            let result = typed
                .call(&mut self.store, &args)
                .map_err(|e| self.execution(e))?;
            output.push(Value::Float(result));
        }

        Ok(output)
    }

    fn invoke_columnar(
        &mut self,
        columns: &[&[Value]],
        parameters: &Map<String, JsonValue>,
    ) -> ExtensionResult<Vec<Value>> {
        let payload = json!({
            "columns": columns
                .iter()
                .map(|c| c.iter().map(payload_cell).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "parameters": parameters,
        });
        let bytes = serde_json::to_vec(&payload).map_err(|e| self.execution(e))?;
        let len = i32::try_from(bytes.len()).map_err(|_| self.execution("payload exceeds 2 GiB"))?;

        let memory = self
            .instance
            .get_memory(&self.store, "memory")
            .ok_or_else(|| self.execution("module does not export `memory`"))?;
        let alloc = self
            .instance
            .get_typed_func::<i32, i32>(&self.store, "alloc")
            .map_err(|e| self.execution(format!("`alloc(i32) -> i32` unavailable: {e}")))?;

        self.refuel()?;
        let ptr = alloc.call(&mut self.store, len).map_err(|e| self.execution(e))?;
        memory
            .write(&mut self.store, ptr as u32 as usize, &bytes)
            .map_err(|e| self.execution(e))?;

        let typed = self
            .func
            .typed::<(i32, i32), i64>(&self.store)
            .map_err(|e| self.execution(e))?;
        self.refuel()?;
        let packed = typed
            .call(&mut self.store, (ptr, len))
            .map_err(|e| self.execution(e))? as u64;

        let out_ptr = (packed >> 32) as usize;
        let out_len = (packed & 0xFFFF_FFFF) as usize;
        let memory_size = memory.data_size(&self.store);
        if out_ptr.checked_add(out_len).map_or(true, |end| end > memory_size) {
            return Err(self.execution(format!(
                "result range {out_ptr}..{out_ptr}+{out_len} is outside the {memory_size}-byte memory"
            )));
        }
        let mut buffer = vec![0u8; out_len];
        memory
            .read(&self.store, out_ptr, &mut buffer)
            .map_err(|e| self.execution(e))?;

        let result: Vec<JsonValue> = serde_json::from_slice(&buffer)
            .map_err(|e| self.execution(format!("result is not a JSON array: {e}")))?;
        Ok(result.iter().map(Value::from_json).collect())
    }
}

impl ExtensionFunction for WasmExtension {
    fn name(&self) -> &str {
        &self.function
    }

    fn invoke(
        &mut self,
        columns: &[&[Value]],
        parameters: &Map<String, JsonValue>,
    ) -> ExtensionResult<Vec<Value>> {
        match self.convention {
            Convention::Scalar { arity } => self.invoke_scalar(arity, columns, parameters),
            Convention::Columnar => self.invoke_columnar(columns, parameters),
        }
    }
}

/// Scalar argument for a cell: `Ok(None)` when missing, `Err(type)` when not passable.
fn scalar_arg(value: &Value) -> Result<Option<f64>, &'static str> {
    match value {
        v if v.is_missing() => Ok(None),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(value.as_f64()),
        Value::Timestamp(t) => Ok(Some(t.and_utc().timestamp_micros() as f64 / 1_000_000.0)),
        Value::Duration(d) => Ok(Some(duration_seconds(d))),
        other => Err(other.type_name()),
    }
}

/// JSON form of a cell in the columnar payload; durations travel as seconds.
fn payload_cell(value: &Value) -> JsonValue {
    match value {
        Value::Duration(d) => Number::from_f64(duration_seconds(d)).map_or(JsonValue::Null, JsonValue::Number),
        other => other.to_json().unwrap_or(JsonValue::Null),
    }
}
