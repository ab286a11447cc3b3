//! The pipeline compiler.
//!
//! A pipeline definition is a finite ordered list of JSON expressions,
//! one per stage. An expression is either a string name or an object with
//! exactly one key (the function name) whose value is a single argument
//! or an array of arguments. Arguments are themselves expressions,
//! literals, or strings used as names.
//!
//! Compilation walks the list in order, building each stage in a symbol
//! table that starts with one binding: `"input"`, the pipeline source
//! behind a [`Multiplexer`]. A string expression resolves first as a
//! bound stream name (yielding a fresh multiplexer reader), then as a
//! zero-argument function. After each stage its result is rebound under
//! `"_stage_prev"` so the following stage can reference it. The last
//! stage's stream is the pipeline output.
//!
//! Arity and argument-shape problems are compile errors: nothing is
//! installed from a definition that fails to compile.

mod stages;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::CodecRegistry;
use crate::error::{CompileError, Result};
use crate::stream::{BoxStream, Multiplexer};

/// Name bound to the pipeline source in every definition's scope.
pub const INPUT: &str = "input";

/// Reserved name rebound to each stage's result as compilation proceeds.
pub const PREV_STAGE: &str = "_stage_prev";

/// A stage-building function: receives the compiler (for recursive
/// builds and codec lookup), the scope, and the raw JSON arguments.
pub type StageFn = Arc<dyn Fn(&Compiler, &mut Scope, &[Value]) -> Result<BoxStream> + Send + Sync>;

/// The symbol table threaded through one definition's compilation.
///
/// Every binding sits behind a [`Multiplexer`], so each reference hands
/// out an independent reader and no two consumers ever share a stream.
pub struct Scope {
    bindings: HashMap<String, Multiplexer>,
}

impl Scope {
    fn with_input(source: BoxStream) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(INPUT.to_string(), Multiplexer::new(source));
        Self { bindings }
    }

    /// Binds `name`, failing on duplicates.
    ///
    /// # Errors
    ///
    /// [`CompileError::DuplicateName`] when the name is already bound.
    pub fn bind(&mut self, name: &str, stream: BoxStream) -> Result<()> {
        if self.bindings.contains_key(name) {
            return Err(CompileError::DuplicateName(name.to_string()).into());
        }
        self.bindings.insert(name.to_string(), Multiplexer::new(stream));
        Ok(())
    }

    fn rebind(&mut self, name: &str, mux: Multiplexer) {
        self.bindings.insert(name.to_string(), mux);
    }

    /// A fresh reader of the stream bound to `name`, if any.
    #[must_use]
    pub fn reader(&self, name: &str) -> Option<BoxStream> {
        self.bindings.get(name).map(|mux| Box::new(mux.reader()) as BoxStream)
    }
}

/// Compiles JSON pipeline definitions into executable stream graphs.
///
/// The function table and codec registry are explicit state: construct
/// one compiler at startup (usually [`Compiler::with_defaults`]) and
/// share it.
pub struct Compiler {
    functions: HashMap<String, StageFn>,
    codecs: CodecRegistry,
}

impl Compiler {
    /// An empty compiler with the given codecs and no functions.
    #[must_use]
    pub fn new(codecs: CodecRegistry) -> Self {
        Self { functions: HashMap::new(), codecs }
    }

    /// A compiler carrying the built-in combinator library and the
    /// default codecs.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut compiler = Self::new(CodecRegistry::with_defaults());
        stages::register_defaults(&mut compiler);
        compiler
    }

    /// Registers (or replaces) a stage function under `name`.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&Compiler, &mut Scope, &[Value]) -> Result<BoxStream> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(f));
    }

    /// The codec registry used by `encode` / `decode` stages.
    #[must_use]
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Compiles `defs` against `source`.
    ///
    /// An empty definition list returns the source untouched.
    ///
    /// # Errors
    ///
    /// Any compile error from any stage; nothing of a failed compile is
    /// usable.
    pub fn compile(&self, source: BoxStream, defs: &[Value]) -> Result<BoxStream> {
        if defs.is_empty() {
            return Ok(source);
        }
        let mut scope = Scope::with_input(source);
        let mut out = crate::stream::combinators::empty();
        for (index, def) in defs.iter().enumerate() {
            let stage = self.build(&mut scope, def)?;
            if index + 1 == defs.len() {
                // the last stage is the pipeline output; earlier stages
                // are reachable only through their stage binding, so an
                // unreferenced one is never pulled
                out = stage;
            } else {
                scope.rebind(PREV_STAGE, Multiplexer::new(stage));
            }
        }
        Ok(out)
    }

    /// Builds a single expression in `scope`.
    ///
    /// # Errors
    ///
    /// Compile errors for unknown names, bad shapes or bad arities.
    pub fn build(&self, scope: &mut Scope, expr: &Value) -> Result<BoxStream> {
        match expr {
            Value::String(name) => {
                if let Some(reader) = scope.reader(name) {
                    return Ok(reader);
                }
                if let Some(f) = self.functions.get(name.as_str()) {
                    return f(self, scope, &[]);
                }
                Err(CompileError::UnboundName(name.clone()).into())
            }
            Value::Object(map) if map.len() == 1 => {
                let (name, raw_args) = map.iter().next().ok_or_else(|| {
                    CompileError::InvalidExpression(expr.to_string())
                })?;
                let args: Vec<Value> = match raw_args {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                let f = self
                    .functions
                    .get(name.as_str())
                    .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
                f(self, scope, &args)
            }
            other => Err(CompileError::InvalidExpression(other.to_string()).into()),
        }
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("functions", &self.functions.len())
            .field("codecs", &self.codecs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::event::Event;
    use crate::stream::combinators::from_events;
    use crate::stream::{collect, EventStream};
    use serde_json::json;

    fn input(events: Vec<Event>) -> BoxStream {
        from_events(events)
    }

    fn objs(values: &[i64]) -> Vec<Event> {
        values.iter().map(|x| Event::from(json!({ "x": x }))).collect()
    }

    #[test]
    fn empty_defs_return_source() {
        let compiler = Compiler::with_defaults();
        let mut out = compiler.compile(input(objs(&[1])), &[]).unwrap();
        assert_eq!(collect(&mut out).unwrap().len(), 1);
    }

    #[test]
    fn filter_pipeline_gates_events() {
        // filter(input, get_field(input, "x") > 3)
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({
            "filter": ["input", {">": [{"get_field": ["input", "x"]}, 3]}]
        })];
        let mut out = compiler
            .compile(input(objs(&[1, 5, 3, 10])), &defs)
            .unwrap();
        assert_eq!(collect(&mut out).unwrap(), objs(&[5, 10]));
    }

    #[test]
    fn string_stage_resolves_as_bound_name() {
        let compiler = Compiler::with_defaults();
        let defs = vec![json!("input"), json!({"get_field": ["_stage_prev", "x"]})];
        let mut out = compiler.compile(input(objs(&[7])), &defs).unwrap();
        assert_eq!(collect(&mut out).unwrap(), vec![Event::Num(7.0)]);
    }

    #[test]
    fn save_and_load_share_a_stage() {
        let compiler = Compiler::with_defaults();
        let defs = vec![
            json!({"save": ["vals", {"get_field": ["input", "x"]}]}),
            json!({"filter": [{"load": "vals"}, {">": [{"load": "vals"}, 2]}]}),
        ];
        let mut out = compiler.compile(input(objs(&[1, 4])), &defs).unwrap();
        assert_eq!(collect(&mut out).unwrap(), vec![Event::Num(4.0)]);
    }

    #[test]
    fn save_rejects_duplicates() {
        let compiler = Compiler::with_defaults();
        let defs = vec![
            json!({"save": ["s", "input"]}),
            json!({"save": ["s", "input"]}),
        ];
        let err = compiler.compile(input(vec![]), &defs).unwrap_err();
        assert!(matches!(
            err,
            Error::Compile(CompileError::DuplicateName(name)) if name == "s"
        ));
    }

    #[test]
    fn load_of_unknown_name_fails() {
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({"load": "ghost"})];
        let err = compiler.compile(input(vec![]), &defs).unwrap_err();
        assert!(matches!(
            err,
            Error::Compile(CompileError::UnboundName(name)) if name == "ghost"
        ));
    }

    #[test]
    fn wrong_arity_is_a_compile_error() {
        // get_field with one argument instead of two
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({"get_field": "input"})];
        let err = compiler.compile(input(vec![]), &defs).unwrap_err();
        assert!(matches!(err, Error::Compile(CompileError::Arity { .. })));
    }

    #[test]
    fn unknown_function_is_a_compile_error() {
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({"warp": []})];
        let err = compiler.compile(input(vec![]), &defs).unwrap_err();
        assert!(matches!(err, Error::Compile(CompileError::UnknownFunction(_))));
    }

    #[test]
    fn malformed_expression_is_a_compile_error() {
        let compiler = Compiler::with_defaults();
        for bad in [json!(42), json!({"a": 1, "b": 2})] {
            let err = compiler.compile(input(vec![]), &[bad]).unwrap_err();
            assert!(matches!(err, Error::Compile(CompileError::InvalidExpression(_))));
        }
    }

    #[test]
    fn rolling_max_pipeline() {
        // events are {d, v}; emit d whenever v reaches a new maximum
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({
            "max_by_roll": [
                {"get_field": ["input", "d"]},
                {"get_field": ["input", "v"]}
            ]
        })];
        let events: Vec<Event> = [("a", 1), ("b", 3), ("c", 2), ("d", 5), ("e", 4)]
            .iter()
            .map(|(d, v)| Event::from(json!({ "d": d, "v": v })))
            .collect();
        let mut out = compiler.compile(input(events), &defs).unwrap();
        assert_eq!(
            collect(&mut out).unwrap(),
            vec![Event::from("a"), Event::from("b"), Event::from("d")]
        );
    }

    #[test]
    fn ema_n_derives_alpha_from_sample_count() {
        // n = 1 gives alpha = 0.5
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({"ema_n": ["input", 1]})];
        let events = vec![Event::Num(10.0), Event::Num(20.0)];
        let mut out = compiler.compile(input(events), &defs).unwrap();
        assert_eq!(
            collect(&mut out).unwrap(),
            vec![Event::Num(10.0), Event::Num(15.0)]
        );
    }

    #[test]
    fn set_field_and_zip_compose() {
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({
            "set_field": ["input", "y", {"get_field": ["input", "x"]}]
        })];
        let mut out = compiler.compile(input(objs(&[3])), &defs).unwrap();
        let evt = out.next().unwrap().unwrap();
        assert_eq!(evt.path("y"), Some(&Event::Num(3.0)));
        assert_eq!(evt.path("x"), Some(&Event::Num(3.0)));
    }

    #[test]
    fn encode_then_decode_through_registry() {
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({"decode": [{"encode": ["input", "json"]}, "json"]})];
        let events = objs(&[9]);
        let mut out = compiler.compile(input(events.clone()), &defs).unwrap();
        assert_eq!(collect(&mut out).unwrap(), events);
    }

    #[test]
    fn unknown_codec_fails_compile() {
        let compiler = Compiler::with_defaults();
        let defs = vec![json!({"encode": ["input", "avro"]})];
        let err = compiler.compile(input(vec![]), &defs).unwrap_err();
        assert!(matches!(err, Error::Compile(CompileError::UnknownEncoder(_))));
    }
}
