//! Program disassembler.
//!
//! Walks a compiled program the way the runtime interpreter does and turns
//! each instruction back into text. Parameter values are shown with
//! [`ValueEncoding::decode_rounded`](crate::value::ValueEncoding::decode_rounded),
//! so the output is for reading, not for re-assembly.

use crate::errors::*;
use crate::node::{OPCODE_ENDREPEAT, OPCODE_POP, OPCODE_REPEAT};
use crate::registry::Registry;
use crate::stream::NUM_VALUES;
use std::fmt;

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Repeat { count: u32 },
    EndRepeat,
    Pop,
    Node {
        name: String,
        /// `(keyword, decoded parameter)` in written order.
        params: Vec<(String, String)>,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Repeat { count } => write!(f, "repeat {}", count),
            Instruction::EndRepeat => f.write_str("end"),
            Instruction::Pop => f.write_str("pop"),
            Instruction::Node { name, params } => {
                f.write_str(name)?;
                for (keyword, value) in params {
                    write!(f, " {}={}", keyword, value)?;
                }
                Ok(())
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn next(&mut self) -> Result<u8> {
        let value = *self.bytes.get(self.pos).ok_or_else(|| {
            SynthCodeError::Validation(format!("program overrun at byte {}", self.pos))
        })?;
        if value >= NUM_VALUES {
            return Err(SynthCodeError::Range(value as i64));
        }
        self.pos += 1;
        Ok(value)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let start = self.pos;
        for _ in 0..n {
            self.next()?;
        }
        let bytes = self.bytes;
        Ok(&bytes[start..self.pos])
    }

    fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

/// Decode a compiled program into instructions.
///
/// The program must be well formed: known opcodes and parameter types, no
/// nested or unterminated repeat blocks, and no truncated instruction.
pub fn disassemble(registry: &Registry, bytes: &[u8]) -> Result<Vec<Instruction>> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut out = Vec::new();
    let mut in_repeat = false;

    while !reader.done() {
        let at = reader.pos;
        let opcode = reader.next()?;
        let instruction = match opcode {
            OPCODE_REPEAT => {
                if in_repeat {
                    return Err(SynthCodeError::Structural(format!(
                        "nested repeat at byte {}",
                        at
                    )));
                }
                in_repeat = true;
                Instruction::Repeat {
                    count: reader.next()? as u32 + 1,
                }
            }
            OPCODE_ENDREPEAT => {
                if !in_repeat {
                    return Err(SynthCodeError::Structural(format!(
                        "unexpected end repeat at byte {}",
                        at
                    )));
                }
                in_repeat = false;
                Instruction::EndRepeat
            }
            OPCODE_POP => Instruction::Pop,
            _ => {
                let op = registry.nodes().by_id(opcode).ok_or_else(|| {
                    SynthCodeError::Structural(format!("invalid opcode {} at byte {}", opcode, at))
                })?;
                let mut params = Vec::with_capacity(op.params().len());
                for keyword in op.params() {
                    let type_at = reader.pos;
                    let id = reader.next()?;
                    let ty = registry.param_types().by_id(id).ok_or_else(|| {
                        SynthCodeError::Structural(format!(
                            "invalid parameter type {} at byte {}",
                            id, type_at
                        ))
                    })?;
                    let fields = reader.take(ty.arity())?;
                    params.push((keyword.clone(), ty.decode(fields)?));
                }
                Instruction::Node {
                    name: op.name().to_string(),
                    params,
                }
            }
        };
        out.push(instruction);
    }

    if in_repeat {
        return Err(SynthCodeError::Structural("unterminated repeat".to_string()));
    }
    Ok(out)
}

/// Disassemble into one line per instruction, indenting repeat bodies.
pub fn disassemble_to_string(registry: &Registry, bytes: &[u8]) -> Result<String> {
    let mut text = String::new();
    let mut depth: usize = 0;
    for instruction in disassemble(registry, bytes)? {
        if instruction == Instruction::EndRepeat {
            depth -= 1;
        }
        text.push_str(&"    ".repeat(depth));
        text.push_str(&instruction.to_string());
        text.push('\n');
        if let Instruction::Repeat { .. } = instruction {
            depth += 1;
        }
    }
    Ok(text)
}
