//! Build script for synthcode-core.
//!
//! Generates the node dispatch table and one parameter writer per node
//! family from `node_manifests/nodes.json`. Manifest order is opcode order.

use serde_json::Value;
use std::collections::HashSet;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const MANIFEST: &str = "node_manifests/nodes.json";

fn main() {
    println!("cargo:rerun-if-changed={}", MANIFEST);

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("generated.rs");
    let mut f = File::create(&dest_path).unwrap();

    let manifest_str = fs::read_to_string(MANIFEST)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", MANIFEST, e));
    let manifest: Vec<Value> = serde_json::from_str(&manifest_str)
        .unwrap_or_else(|e| panic!("invalid JSON in {}: {}", MANIFEST, e));

    writeln!(f, "// AUTO-GENERATED FILE - DO NOT EDIT").unwrap();
    writeln!(f, "// Generated from {}\n", MANIFEST).unwrap();

    let mut seen_names = HashSet::new();
    let mut families = Vec::new();

    for family in &manifest {
        let kind = family["kind"].as_str().expect("node family without kind");
        let description = family
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let names = string_list(family, "names", kind);
        let params = string_list(family, "params", kind);

        if names.is_empty() {
            panic!("node family {} declares no names", kind);
        }
        for name in &names {
            if !seen_names.insert(name.clone()) {
                panic!("duplicate node name in manifest: {}", name);
            }
        }
        for param in &params {
            if !is_identifier(param) {
                panic!("node family {} has invalid parameter name {:?}", kind, param);
            }
        }

        let writer = format!("write_{}", kind);

        // Writer: every declared parameter, in manifest order.
        writeln!(f, "/// Parameter writer for the `{}` node family.", kind).unwrap();
        writeln!(
            f,
            "fn {}(stream: &mut ByteStream, args: &NodeArgs<'_>) -> Result<()> {{",
            writer
        )
        .unwrap();
        for param in &params {
            writeln!(f, "    args.get({:?}).write(stream)?;", param).unwrap();
        }
        writeln!(f, "    Ok(())").unwrap();
        writeln!(f, "}}\n").unwrap();

        families.push((kind.to_string(), description.to_string(), names, params, writer));
    }

    writeln!(f, "/// Node families in registration order.").unwrap();
    writeln!(f, "pub static NODE_FAMILIES: &[NodeFamily] = &[").unwrap();
    for (kind, description, names, params, writer) in &families {
        writeln!(f, "    NodeFamily {{").unwrap();
        writeln!(f, "        kind: {:?},", kind).unwrap();
        writeln!(f, "        description: {:?},", description).unwrap();
        writeln!(f, "        names: &[{}],", quoted(names)).unwrap();
        writeln!(f, "        params: &[{}],", quoted(params)).unwrap();
        writeln!(f, "        writer: {},", writer).unwrap();
        writeln!(f, "    }},").unwrap();
    }
    writeln!(f, "];").unwrap();
}

fn string_list(family: &Value, key: &str, kind: &str) -> Vec<String> {
    family[key]
        .as_array()
        .unwrap_or_else(|| panic!("node family {} is missing {}", kind, key))
        .iter()
        .map(|v| {
            v.as_str()
                .unwrap_or_else(|| panic!("node family {}: {} must be strings", kind, key))
                .to_string()
        })
        .collect()
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("{:?}", s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
