//! SynthCode CLI - The `synthcode` command.
//!
//! Compiles the standard instruments, plus any instruments declared in Rhai
//! scripts, into the JSON document consumed by the synthesizer runtime.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use synthcode_core::node::{NODE_FAMILIES, OPCODE_ENDREPEAT, OPCODE_POP, OPCODE_REPEAT};
use synthcode_core::{
    disassemble_to_string, load_script_file, registry, standard_instruments, CompiledProgram,
    InstrumentRegistry,
};

/// SynthCode - instrument compiler
#[derive(Parser, Debug)]
#[command(name = "synthcode")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile synthesizer instruments into SynthCode programs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Where instruments come from.
#[derive(clap::Args, Debug)]
struct Sources {
    /// Rhai script declaring extra instruments (repeatable)
    #[arg(short, long = "script", value_name = "FILE")]
    scripts: Vec<PathBuf>,

    /// Leave out the built-in instruments
    #[arg(long)]
    no_standard: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile every instrument to a JSON document of base64 programs
    Compile {
        #[command(flatten)]
        sources: Sources,

        /// Write the document here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the disassembly of one or all instruments
    Disasm {
        #[command(flatten)]
        sources: Sources,

        /// Instrument to show
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// List parameter type IDs and opcodes
    Params,
}

/// The output document: instrument name to base64 program, in registration order.
#[derive(Serialize, Debug)]
struct Document {
    instruments: serde_json::Map<String, serde_json::Value>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    match args.command {
        Commands::Compile { sources, output } => compile(sources, output),
        Commands::Disasm { sources, name } => disasm(sources, name),
        Commands::Params => {
            print!("{}", tables());
            Ok(())
        }
    }
}

fn load_instruments(sources: &Sources) -> Result<InstrumentRegistry> {
    let mut instruments = if sources.no_standard {
        InstrumentRegistry::new()
    } else {
        standard_instruments().context("Failed to register standard instruments")?
    };
    for script in &sources.scripts {
        let names = load_script_file(registry(), script, &mut instruments)
            .with_context(|| format!("Failed to load script: {}", script.display()))?;
        log::info!("Loaded {} instruments from {}", names.len(), script.display());
    }
    Ok(instruments)
}

fn build_document(programs: &[CompiledProgram]) -> Document {
    let instruments = programs
        .iter()
        .map(|p| (p.name.clone(), serde_json::Value::String(STANDARD.encode(&p.bytes))))
        .collect();
    Document { instruments }
}

fn compile(sources: Sources, output: Option<PathBuf>) -> Result<()> {
    let instruments = load_instruments(&sources)?;
    let programs = instruments
        .compile_all(registry())
        .context("Compilation failed")?;
    let json = serde_json::to_string_pretty(&build_document(&programs))
        .context("Failed to serialize output")?;

    match output {
        Some(path) => {
            fs::write(&path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} instruments to {}", programs.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn disasm(sources: Sources, name: Option<String>) -> Result<()> {
    let instruments = load_instruments(&sources)?;
    let selected: Vec<_> = match &name {
        Some(name) => vec![instruments
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("No such instrument: {}", name))?],
        None => instruments.iter().collect(),
    };

    for (i, instrument) in selected.into_iter().enumerate() {
        let bytes = instrument
            .compile(registry())
            .with_context(|| format!("Failed to compile {}", instrument.name()))?;
        let text = disassemble_to_string(registry(), &bytes)
            .with_context(|| format!("Failed to disassemble {}", instrument.name()))?;
        if i > 0 {
            println!();
        }
        println!("# {} ({} bytes)", instrument.name(), bytes.len());
        print!("{}", text);
    }
    Ok(())
}

/// Parameter types, opcodes and node families as printed by `synthcode params`.
fn tables() -> String {
    let reg = registry();
    let mut out = String::new();

    let _ = writeln!(out, "Parameter types:");
    for ty in reg.param_types().iter() {
        let fields: Vec<&str> = ty.fields().iter().map(|f| f.name()).collect();
        let _ = writeln!(out, "  {:3}  {:<14} ({})", ty.id(), ty.name(), fields.join(", "));
    }

    let _ = writeln!(out, "\nOpcodes:");
    let _ = writeln!(out, "  {:3}  repeat (count)", OPCODE_REPEAT);
    let _ = writeln!(out, "  {:3}  end", OPCODE_ENDREPEAT);
    let _ = writeln!(out, "  {:3}  pop", OPCODE_POP);
    for op in reg.nodes().iter() {
        let _ = writeln!(out, "  {:3}  {:<14} ({})", op.id(), op.name(), op.params().join(", "));
    }

    let _ = writeln!(out, "\nNode families:");
    for family in NODE_FAMILIES {
        let _ = writeln!(out, "  {:<11} {}", family.kind, family.names.join(", "));
        let _ = writeln!(out, "              {}", family.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_keeps_registration_order() {
        let programs = vec![
            CompiledProgram {
                name: "Zeta".to_string(),
                bytes: vec![2],
            },
            CompiledProgram {
                name: "Alpha".to_string(),
                bytes: vec![3, 1, 11],
            },
        ];
        let json = serde_json::to_string(&build_document(&programs)).unwrap();
        assert_eq!(json, r#"{"instruments":{"Zeta":"Ag==","Alpha":"AwEL"}}"#);
    }

    #[test]
    fn test_standard_document() {
        let sources = Sources {
            scripts: Vec::new(),
            no_standard: false,
        };
        let programs = load_instruments(&sources)
            .unwrap()
            .compile_all(registry())
            .unwrap();
        let doc = build_document(&programs);
        let names: Vec<&String> = doc.instruments.keys().collect();
        assert_eq!(names, ["Bass", "Dance Bass", "Soft Lead", "Pluck"]);
        let pluck = STANDARD
            .decode(doc.instruments["Pluck"].as_str().unwrap())
            .unwrap();
        assert_eq!(pluck, programs[3].bytes);
    }

    #[test]
    fn test_tables_list_ids_and_families() {
        let text = tables();
        assert!(text.contains("    7  FADSR          (frequency, frequency, time, time, gain, time)"));
        assert!(text.contains("    7  bandpass       (frequency, detune, q)"));
        assert!(text.contains("Biquad filter; the opcode selects the filter response."));
        assert!(text.contains("  oscillator  square, sawtooth, triangle"));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "synthcode",
            "compile",
            "--script",
            "a.rhai",
            "-s",
            "b.rhai",
            "--output",
            "out.json",
        ]);
        match args.command {
            Commands::Compile { sources, output } => {
                assert_eq!(sources.scripts.len(), 2);
                assert!(!sources.no_standard);
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
