//! Node and opcode registry.
//!
//! Opcodes 0-2 are control instructions. Every node name registered after
//! that gets the next opcode, starting at [`FIRST_NODE_OPCODE`]. Names in the
//! same family share a parameter writer but keep distinct opcodes, since the
//! runtime picks the filter response or waveform from the opcode itself.
//!
//! The canonical families come from `node_manifests/nodes.json` via the
//! build script:
//!
//! | opcode | name     | parameters             |
//! |--------|----------|------------------------|
//! | 3      | gain     | gain                   |
//! | 4      | pan      | pan                    |
//! | 5-7    | lowpass, highpass, bandpass | frequency, detune, q |
//! | 8-10   | square, sawtooth, triangle  | frequency, detune    |

use crate::errors::*;
use crate::param::Parameter;
use crate::stream::{ByteStream, NUM_VALUES};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Start of a repeat block, followed by `count - 1`.
pub const OPCODE_REPEAT: u8 = 0;
/// End of a repeat block.
pub const OPCODE_ENDREPEAT: u8 = 1;
/// Detach the most recently attached node from the signal chain.
pub const OPCODE_POP: u8 = 2;
/// First opcode available to processing nodes.
pub const FIRST_NODE_OPCODE: u8 = 3;

/// Writes a node's parameters, in its fixed order, after the opcode.
pub type NodeWriter = fn(&mut ByteStream, &NodeArgs<'_>) -> Result<()>;

/// Keyword parameters passed to a node, with the `Default` fallback.
pub struct NodeArgs<'a> {
    given: &'a [(&'a str, Parameter)],
    default: &'a Parameter,
}

impl<'a> NodeArgs<'a> {
    pub fn new(given: &'a [(&'a str, Parameter)], default: &'a Parameter) -> Self {
        Self { given, default }
    }

    /// The parameter passed under `name`, or the default parameter.
    pub fn get(&self, name: &str) -> &'a Parameter {
        self.given
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, param)| param)
            .unwrap_or(self.default)
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.given.iter().map(|(key, _)| *key)
    }
}

/// A family of node names sharing one parameter layout.
#[derive(Clone, Copy)]
pub struct NodeFamily {
    pub kind: &'static str,
    pub description: &'static str,
    pub names: &'static [&'static str],
    pub params: &'static [&'static str],
    pub writer: NodeWriter,
}

impl fmt::Debug for NodeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFamily")
            .field("kind", &self.kind)
            .field("names", &self.names)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

include!(concat!(env!("OUT_DIR"), "/generated.rs"));

/// A registered node name.
pub struct OpcodeDescriptor {
    id: u8,
    name: String,
    kind: String,
    params: Vec<String>,
    writer: NodeWriter,
}

impl fmt::Debug for OpcodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl OpcodeDescriptor {
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Keyword parameters in the order they are written.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Write the opcode and every parameter.
    ///
    /// Keywords the node does not declare, and keywords given more than once,
    /// are rejected before anything is written.
    pub fn write(&self, stream: &mut ByteStream, args: &NodeArgs<'_>) -> Result<()> {
        for (i, name) in args.names().enumerate() {
            if !self.params.iter().any(|p| p == name) {
                return Err(SynthCodeError::Validation(format!(
                    "{} has no parameter {:?} (expected one of {:?})",
                    self.name, name, self.params
                )));
            }
            if args.names().take(i).any(|earlier| earlier == name) {
                return Err(SynthCodeError::Validation(format!(
                    "{} got parameter {:?} more than once",
                    self.name, name
                )));
            }
        }
        stream.write(self.id)?;
        (self.writer)(stream, args)
    }
}

/// Maps node names to opcodes and writers.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    ops: Vec<Arc<OpcodeDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a family of names; each name takes the next opcode.
    pub fn register(
        &mut self,
        kind: &str,
        names: &[&str],
        params: &[&str],
        writer: NodeWriter,
    ) -> Result<()> {
        if let Some(dup) = names.iter().find(|n| self.by_name.contains_key(**n)) {
            return Err(SynthCodeError::Structural(format!(
                "duplicate opcode: {:?}",
                dup
            )));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(SynthCodeError::Structural(format!(
                    "duplicate opcode: {:?}",
                    name
                )));
            }
        }
        let first = FIRST_NODE_OPCODE as usize + self.ops.len();
        if first + names.len() > NUM_VALUES as usize {
            return Err(SynthCodeError::Structural(format!(
                "opcode space exhausted registering {:?}",
                names
            )));
        }
        for name in names {
            let id = (FIRST_NODE_OPCODE as usize + self.ops.len()) as u8;
            self.by_name.insert(name.to_string(), self.ops.len());
            self.ops.push(Arc::new(OpcodeDescriptor {
                id,
                name: name.to_string(),
                kind: kind.to_string(),
                params: params.iter().map(|p| p.to_string()).collect(),
                writer,
            }));
            log::debug!("[NODE] Registered {} as opcode {}", name, id);
        }
        Ok(())
    }

    /// Look up a node by name.
    pub fn get(&self, name: &str) -> Result<&Arc<OpcodeDescriptor>> {
        self.by_name
            .get(name)
            .map(|&i| &self.ops[i])
            .ok_or_else(|| SynthCodeError::Structural(format!("no such opcode: {:?}", name)))
    }

    pub fn by_id(&self, id: u8) -> Option<&Arc<OpcodeDescriptor>> {
        (id as usize)
            .checked_sub(FIRST_NODE_OPCODE as usize)
            .and_then(|i| self.ops.get(i))
    }

    /// Descriptors in opcode order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<OpcodeDescriptor>> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Registry holding the generated [`NODE_FAMILIES`], in manifest order.
    pub fn standard() -> Result<Self> {
        let mut reg = Self::new();
        for family in NODE_FAMILIES {
            reg.register(family.kind, family.names, family.params, family.writer)?;
        }
        Ok(reg)
    }
}
