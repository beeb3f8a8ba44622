//! Instrument registry and compiler.

use crate::builder::Builder;
use crate::errors::*;
use crate::registry::Registry;

/// Writes an instrument's program into a builder.
pub type Procedure = Box<dyn Fn(&mut Builder<'_>) -> Result<()>>;

/// A named instrument definition.
pub struct Instrument {
    name: String,
    procedure: Procedure,
}

impl Instrument {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile this instrument against `registry`.
    pub fn compile(&self, registry: &Registry) -> Result<Vec<u8>> {
        compile(registry, &*self.procedure)
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The bytes of one compiled instrument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledProgram {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Instruments in registration order.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instrument; names must be unique.
    pub fn register<F>(&mut self, name: &str, procedure: F) -> Result<()>
    where
        F: Fn(&mut Builder<'_>) -> Result<()> + 'static,
    {
        if self.get(name).is_some() {
            return Err(SynthCodeError::Structural(format!(
                "duplicate instrument name: {:?}",
                name
            )));
        }
        self.instruments.push(Instrument {
            name: name.to_string(),
            procedure: Box::new(procedure),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instruments.iter().map(|i| i.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Compile every instrument in registration order.
    ///
    /// Each instrument gets its own builder. The first failure is returned
    /// tagged with the instrument's name.
    pub fn compile_all(&self, registry: &Registry) -> Result<Vec<CompiledProgram>> {
        self.instruments
            .iter()
            .map(|instrument| {
                let bytes = instrument.compile(registry).map_err(|err| {
                    SynthCodeError::Instrument {
                        name: instrument.name.clone(),
                        source: Box::new(err),
                    }
                })?;
                log::debug!(
                    "[COMPILE] '{}' compiled to {} bytes",
                    instrument.name,
                    bytes.len()
                );
                Ok(CompiledProgram {
                    name: instrument.name.clone(),
                    bytes,
                })
            })
            .collect()
    }
}

/// Run a procedure against a fresh builder and return the finished program.
pub fn compile<F>(registry: &Registry, procedure: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Builder<'_>) -> Result<()>,
{
    let mut builder = Builder::new(registry);
    procedure(&mut builder)?;
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param;

    fn small(b: &mut Builder<'_>) -> Result<()> {
        let p = b.params();
        b.emit("gain", &[("gain", param!(p.gconst; 0.5)?)])?;
        b.emit("sawtooth", &[])
    }

    #[test]
    fn test_compile_closure() {
        let reg = Registry::standard().unwrap();
        let bytes = compile(&reg, small).unwrap();
        assert_eq!(bytes, vec![3, 1, 11, 9, 0, 0]);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let reg = Registry::standard().unwrap();
        assert_eq!(compile(&reg, small).unwrap(), compile(&reg, small).unwrap());
    }

    #[test]
    fn test_duplicate_instrument_rejected() {
        let mut instruments = InstrumentRegistry::new();
        instruments.register("Small", small).unwrap();
        let err = instruments.register("Small", small).unwrap_err();
        assert!(matches!(err, SynthCodeError::Structural(_)));
        assert_eq!(instruments.len(), 1);
    }

    #[test]
    fn test_compile_all_preserves_order() {
        let reg = Registry::standard().unwrap();
        let mut instruments = InstrumentRegistry::new();
        instruments.register("B", |b| b.pop()).unwrap();
        instruments.register("A", small).unwrap();
        let compiled = instruments.compile_all(&reg).unwrap();
        let names: Vec<&str> = compiled.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(compiled[0].bytes, vec![2]);
    }

    #[test]
    fn test_compile_all_names_failing_instrument() {
        let reg = Registry::standard().unwrap();
        let mut instruments = InstrumentRegistry::new();
        instruments.register("Fine", small).unwrap();
        instruments
            .register("Open", |b| b.begin_repeat(3))
            .unwrap();
        match instruments.compile_all(&reg) {
            Err(SynthCodeError::Instrument { name, source }) => {
                assert_eq!(name, "Open");
                assert!(matches!(*source, SynthCodeError::Structural(_)));
            }
            other => panic!("expected instrument error, got {:?}", other),
        }
    }
}
