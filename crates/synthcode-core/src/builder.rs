//! Program builder.
//!
//! A [`Builder`] is created per compilation and writes node invocations and
//! control instructions into a [`ByteStream`]. It tracks one bit of state:
//! whether a repeat block is open. Repeat blocks do not nest, and a program
//! cannot finish with one still open.

use crate::errors::*;
use crate::node::{NodeArgs, OPCODE_ENDREPEAT, OPCODE_POP, OPCODE_REPEAT};
use crate::param::{Parameter, StandardParams};
use crate::registry::Registry;
use crate::stream::{ByteStream, MAX_BYTE};

/// Smallest repeat count; a single pass needs no block.
pub const MIN_REPEAT: i64 = 2;
/// Largest repeat count, so that `count - 1` fits in a byte.
pub const MAX_REPEAT: i64 = MAX_BYTE as i64;

/// Writes one instrument program.
pub struct Builder<'r> {
    registry: &'r Registry,
    stream: ByteStream,
    in_repeat: bool,
}

impl<'r> Builder<'r> {
    /// Create an empty builder in the normal state.
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            stream: ByteStream::new(),
            in_repeat: false,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Handles to the canonical parameter types.
    pub fn params(&self) -> &'r StandardParams {
        self.registry.params()
    }

    /// Whether a repeat block is currently open.
    pub fn in_repeat(&self) -> bool {
        self.in_repeat
    }

    /// Bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        self.stream.as_bytes()
    }

    /// Invoke a node by name with keyword parameters.
    ///
    /// Omitted keywords are written as `Default`.
    pub fn emit(&mut self, name: &str, args: &[(&str, Parameter)]) -> Result<()> {
        let registry = self.registry;
        let op = registry.nodes().get(name)?;
        log::trace!("[BUILD] {} (opcode {})", name, op.id());
        op.write(
            &mut self.stream,
            &NodeArgs::new(args, registry.default_param()),
        )
    }

    /// Open a repeat block that the runtime plays `count` times.
    pub fn begin_repeat(&mut self, count: i64) -> Result<()> {
        if self.in_repeat {
            return Err(SynthCodeError::Structural("cannot nest repeats".to_string()));
        }
        if !(MIN_REPEAT..=MAX_REPEAT).contains(&count) {
            return Err(SynthCodeError::Validation(format!(
                "invalid repeat count: {} (must be {}..={})",
                count, MIN_REPEAT, MAX_REPEAT
            )));
        }
        self.stream.write_all(&[OPCODE_REPEAT, (count - 1) as u8])?;
        self.in_repeat = true;
        Ok(())
    }

    /// Close the open repeat block.
    pub fn end_repeat(&mut self) -> Result<()> {
        if !self.in_repeat {
            return Err(SynthCodeError::Structural(
                "end of repeat outside a repeat block".to_string(),
            ));
        }
        self.stream.write(OPCODE_ENDREPEAT)?;
        self.in_repeat = false;
        Ok(())
    }

    /// Run `body` inside a repeat block.
    ///
    /// The block is closed only when `body` succeeds. On error the end marker
    /// is not written and the error is returned as-is; the compilation is
    /// already lost.
    pub fn repeat<F>(&mut self, count: i64, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.begin_repeat(count)?;
        body(self)?;
        self.end_repeat()
    }

    /// Detach the most recently attached node from the signal chain.
    pub fn pop(&mut self) -> Result<()> {
        self.stream.write(OPCODE_POP)
    }

    /// Return the finished program, failing if a repeat block is still open.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.in_repeat {
            return Err(SynthCodeError::Structural("unterminated repeat".to_string()));
        }
        Ok(self.stream.into_bytes())
    }
}
