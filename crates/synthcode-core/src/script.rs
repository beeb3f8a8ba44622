//! Rhai API for instrument definitions.
//!
//! Scripts declare instruments with closures that call node functions:
//!
//! ```rhai
//! instrument("Pluck", || {
//!     gain(#{ gain: GADSR(MIN(), 0.9, MIN(), 0.9) });
//!     bandpass(#{ frequency: FADSR(600, 1800, MIN(), 0.3, MIN(), 0.3) });
//!     square(#{ frequency: Note(0) });
//! });
//! ```
//!
//! Every parameter type is a function of its arity, every node name a
//! function taking an optional map of keyword parameters. `repeat(count, f)`,
//! `pop()`, `MIN()`, `MAX()` and `raw(byte)` are also available. Values can
//! be integers, floats, raw bytes or duration strings such as `"50ms"`, which
//! become seconds.
//!
//! Running an instrument body records its operations into a thread-local
//! list that is then replayed into a real [`Builder`], so scripts obey the
//! same nesting, termination and range rules as Rust instruments.

use crate::builder::Builder;
use crate::errors::{Result, SynthCodeError};
use crate::instrument::InstrumentRegistry;
use crate::param::{Parameter, ParameterType};
use crate::registry::Registry;
use crate::value::{Value, MAX, MIN};
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString, Map, NativeCallContext, Position, AST};
use std::cell::RefCell;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One builder call made by a script body.
#[derive(Clone, Debug)]
enum ScriptOp {
    Node {
        name: String,
        args: Vec<(String, Parameter)>,
    },
    BeginRepeat(i64),
    EndRepeat,
    Pop,
}

// Operations recorded by the instrument body currently running on this thread.
thread_local! {
    static RECORDER: RefCell<Option<Vec<ScriptOp>>> = const { RefCell::new(None) };
}

// Last crate error raised through the Rhai API on this thread, so its kind
// survives the trip through `EvalAltResult`.
thread_local! {
    static RAISED: RefCell<Option<SynthCodeError>> = const { RefCell::new(None) };
}

type Declared = Arc<Mutex<Vec<(String, FnPtr)>>>;

fn script_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        message.into().into(),
        Position::NONE,
    ))
}

fn synthcode_error_to_eval(err: SynthCodeError) -> Box<EvalAltResult> {
    let message = err.to_string();
    RAISED.with(|raised| *raised.borrow_mut() = Some(err));
    script_error(message)
}

/// Turn a failed evaluation back into a crate error.
///
/// If the failure came from the instrument API, the original error kind is
/// returned; anything else is a `Script` error.
fn eval_to_synthcode_error(err: Box<EvalAltResult>) -> SynthCodeError {
    let message = err.to_string();
    match RAISED.with(|raised| raised.borrow_mut().take()) {
        Some(raised) if message.contains(&raised.to_string()) => raised,
        _ => SynthCodeError::Script(message),
    }
}

fn clear_raised() {
    RAISED.with(|raised| *raised.borrow_mut() = None);
}

fn in_instrument_body() -> bool {
    RECORDER.with(|recorder| recorder.borrow().is_some())
}

fn record(op: ScriptOp) -> std::result::Result<(), Box<EvalAltResult>> {
    RECORDER.with(|recorder| match recorder.borrow_mut().as_mut() {
        Some(ops) => {
            ops.push(op);
            Ok(())
        }
        None => Err(script_error(
            "node functions can only be called inside an instrument body",
        )),
    })
}

/// Convert a script value into a [`Value`].
fn to_value(value: &Dynamic) -> std::result::Result<Value, Box<EvalAltResult>> {
    if let Some(v) = value.clone().try_cast::<Value>() {
        return Ok(v);
    }
    if let Ok(i) = value.as_int() {
        return Ok(Value::from(i));
    }
    if let Ok(f) = value.as_float() {
        return Ok(Value::Number(f));
    }
    if let Ok(s) = value.clone().into_immutable_string() {
        let duration = humantime::parse_duration(s.trim()).map_err(|e| {
            synthcode_error_to_eval(SynthCodeError::Validation(format!(
                "invalid duration {:?}: {}",
                s.as_str(),
                e
            )))
        })?;
        return Ok(Value::Number(duration.as_secs_f64()));
    }
    Err(synthcode_error_to_eval(SynthCodeError::Validation(format!(
        "not a value: {} ({})",
        value,
        value.type_name()
    ))))
}

fn build_param(
    ty: &Arc<ParameterType>,
    values: &[Dynamic],
) -> std::result::Result<Parameter, Box<EvalAltResult>> {
    let values = values
        .iter()
        .map(to_value)
        .collect::<std::result::Result<Vec<Value>, _>>()?;
    ty.param(&values).map_err(synthcode_error_to_eval)
}

/// Expose a parameter type as a script function of its arity.
fn register_param_type(engine: &mut Engine, ty: Arc<ParameterType>) {
    let name = ty.name().to_string();
    match ty.arity() {
        0 => {
            engine.register_fn(name, move || build_param(&ty, &[]));
        }
        1 => {
            engine.register_fn(name, move |a: Dynamic| build_param(&ty, &[a]));
        }
        2 => {
            engine.register_fn(name, move |a: Dynamic, b: Dynamic| {
                build_param(&ty, &[a, b])
            });
        }
        3 => {
            engine.register_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic| {
                build_param(&ty, &[a, b, c])
            });
        }
        4 => {
            engine.register_fn(
                name,
                move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
                    build_param(&ty, &[a, b, c, d])
                },
            );
        }
        5 => {
            engine.register_fn(
                name,
                move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic, e: Dynamic| {
                    build_param(&ty, &[a, b, c, d, e])
                },
            );
        }
        6 => {
            engine.register_fn(
                name,
                move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic, e: Dynamic, f: Dynamic| {
                    build_param(&ty, &[a, b, c, d, e, f])
                },
            );
        }
        n => log::warn!(
            "[SCRIPT] Parameter type {} has {} fields and is not available to scripts",
            name,
            n
        ),
    }
}

fn map_to_args(args: Map) -> std::result::Result<Vec<(String, Parameter)>, Box<EvalAltResult>> {
    args.into_iter()
        .map(|(key, value)| {
            let type_name = value.type_name();
            value
                .try_cast::<Parameter>()
                .map(|param| (key.to_string(), param))
                .ok_or_else(|| {
                    synthcode_error_to_eval(SynthCodeError::Validation(format!(
                        "parameter {} is not a Parameter ({})",
                        key, type_name
                    )))
                })
        })
        .collect()
}

/// Expose a node name as a script function.
fn register_node(engine: &mut Engine, name: &str) {
    let bare = name.to_string();
    engine.register_fn(name.to_string(), move || {
        record(ScriptOp::Node {
            name: bare.clone(),
            args: Vec::new(),
        })
    });
    let with_args = name.to_string();
    engine.register_fn(name.to_string(), move |args: Map| {
        let args = map_to_args(args)?;
        record(ScriptOp::Node {
            name: with_args.clone(),
            args,
        })
    });
}

/// Create an engine with the instrument API for `registry`.
fn create_engine(registry: &Registry, declared: Declared) -> Engine {
    let mut engine = Engine::new();

    engine
        .register_type_with_name::<Value>("Value")
        .register_fn("to_string", |v: &mut Value| v.to_string());
    engine
        .register_type_with_name::<Parameter>("Parameter")
        .register_fn("to_string", |p: &mut Parameter| p.to_string());

    engine.register_fn("MIN", || MIN);
    engine.register_fn("MAX", || MAX);
    engine.register_fn(
        "raw",
        |b: i64| -> std::result::Result<Value, Box<EvalAltResult>> {
            u8::try_from(b)
                .map(Value::Raw)
                .map_err(|_| synthcode_error_to_eval(SynthCodeError::Range(b)))
        },
    );

    for ty in registry.param_types().iter() {
        register_param_type(&mut engine, Arc::clone(ty));
    }
    for op in registry.nodes().iter() {
        register_node(&mut engine, op.name());
    }

    engine.register_fn("pop", || record(ScriptOp::Pop));
    engine.register_fn(
        "repeat",
        |ctx: NativeCallContext,
         count: i64,
         body: FnPtr|
         -> std::result::Result<(), Box<EvalAltResult>> {
            record(ScriptOp::BeginRepeat(count))?;
            let _ = body.call_within_context::<Dynamic>(&ctx, ())?;
            record(ScriptOp::EndRepeat)
        },
    );

    engine.register_fn(
        "instrument",
        move |name: ImmutableString,
              body: FnPtr|
              -> std::result::Result<(), Box<EvalAltResult>> {
            if in_instrument_body() {
                return Err(script_error(format!(
                    "instrument {:?} declared inside another instrument body",
                    name.as_str()
                )));
            }
            declared.lock().unwrap().push((name.to_string(), body));
            Ok(())
        },
    );

    engine
}

/// Replay recorded operations into a builder.
fn replay(ops: &[ScriptOp], builder: &mut Builder<'_>) -> Result<()> {
    for op in ops {
        match op {
            ScriptOp::Node { name, args } => {
                let args: Vec<(&str, Parameter)> = args
                    .iter()
                    .map(|(key, param)| (key.as_str(), param.clone()))
                    .collect();
                builder.emit(name, &args)?;
            }
            ScriptOp::BeginRepeat(count) => builder.begin_repeat(*count)?,
            ScriptOp::EndRepeat => builder.end_repeat()?,
            ScriptOp::Pop => builder.pop()?,
        }
    }
    Ok(())
}

/// Run one instrument body and replay what it recorded.
fn run_body(engine: &Engine, ast: &AST, body: &FnPtr, builder: &mut Builder<'_>) -> Result<()> {
    clear_raised();
    RECORDER.with(|recorder| *recorder.borrow_mut() = Some(Vec::new()));
    let result = body.call::<Dynamic>(engine, ast, ());
    let ops = RECORDER
        .with(|recorder| recorder.borrow_mut().take())
        .unwrap_or_default();
    let _ = result.map_err(eval_to_synthcode_error)?;
    log::trace!("[SCRIPT] Replaying {} operations", ops.len());
    replay(&ops, builder)
}

/// Evaluate a script and register every instrument it declares.
///
/// Returns the declared names in order. Instrument bodies are not run
/// until the instrument is compiled. If any declared name is already taken,
/// nothing from the script is registered.
pub fn load_script(
    registry: &Registry,
    source: &str,
    instruments: &mut InstrumentRegistry,
) -> Result<Vec<String>> {
    let declared: Declared = Arc::new(Mutex::new(Vec::new()));
    let engine = Arc::new(create_engine(registry, Arc::clone(&declared)));
    let ast = Arc::new(
        engine
            .compile(source)
            .map_err(|e| SynthCodeError::Script(e.to_string()))?,
    );
    clear_raised();
    engine.run_ast(&ast).map_err(eval_to_synthcode_error)?;

    let declared = std::mem::take(&mut *declared.lock().unwrap());
    for (i, (name, _)) in declared.iter().enumerate() {
        if instruments.get(name).is_some() || declared[..i].iter().any(|(n, _)| n == name) {
            return Err(SynthCodeError::Structural(format!(
                "duplicate instrument name: {:?}",
                name
            )));
        }
    }
    let mut names = Vec::with_capacity(declared.len());
    for (name, body) in declared {
        let engine = Arc::clone(&engine);
        let ast = Arc::clone(&ast);
        instruments.register(&name, move |builder: &mut Builder<'_>| {
            run_body(&engine, &ast, &body, builder)
        })?;
        log::debug!("[SCRIPT] Declared instrument '{}'", name);
        names.push(name);
    }
    Ok(names)
}

/// Read a script file and register its instruments.
pub fn load_script_file(
    registry: &Registry,
    path: impl AsRef<Path>,
    instruments: &mut InstrumentRegistry,
) -> Result<Vec<String>> {
    let source = std::fs::read_to_string(path.as_ref())?;
    load_script(registry, &source, instruments)
}
