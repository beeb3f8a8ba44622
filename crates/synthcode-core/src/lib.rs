//! Instrument compiler for SynthCode programs.
//!
//! A SynthCode program is a flat byte string read by a small synthesizer
//! runtime. Every byte is in `0..125`; the top three values of a 7-bit byte
//! are reserved for framing by the transport. A program is a sequence of
//! node invocations (an opcode followed by typed parameters) plus three
//! control instructions: repeat, end repeat and pop.
//!
//! This crate provides:
//! - Value encodings that squeeze real-valued settings into one byte
//! - The registries that assign parameter type IDs and node opcodes
//! - A [`Builder`] that writes programs and enforces their structure
//! - The standard instrument library and a compiler for it
//! - A Rhai front end for defining instruments in scripts
//! - A disassembler for reading programs back
//!
//! # Example
//!
//! ```
//! use synthcode_core::{compile, param, registry, MIN};
//!
//! let program = compile(registry(), |b| {
//!     let p = b.params();
//!     b.emit("gain", &[("gain", param!(p.gadsr; MIN, 0.9, MIN, 0.9)?)])?;
//!     b.emit("square", &[("frequency", param!(p.note; 0)?)])
//! })
//! .unwrap();
//! assert_eq!(program, [3, 6, 124, 50, 124, 50, 8, 8, 62, 0]);
//! ```

pub mod builder;
pub mod disasm;
pub mod errors;
pub mod instrument;
pub mod library;
pub mod node;
pub mod param;
pub mod registry;
pub mod script;
pub mod stream;
pub mod value;

pub use builder::Builder;
pub use disasm::{disassemble, disassemble_to_string, Instruction};
pub use errors::{Result, SynthCodeError};
pub use instrument::{compile, CompiledProgram, Instrument, InstrumentRegistry};
pub use library::standard_instruments;
pub use param::{ParamRegistry, Parameter, ParameterType, StandardParams};
pub use registry::{registry, Registry};
pub use script::{load_script, load_script_file};
pub use stream::{ByteStream, NUM_VALUES};
pub use value::{Value, ValueEncoding, MAX, MIN};
