//! Composite parameters.
//!
//! A [`ParameterType`] is a named, fixed-arity group of value encodings with
//! a numeric ID assigned by a [`ParamRegistry`] in registration order. The
//! ID is what the runtime sees, so the order of [`ParamRegistry::standard`]
//! is part of the wire format:
//!
//! | id | name          | fields                                       |
//! |----|---------------|----------------------------------------------|
//! | 0  | Default       |                                              |
//! | 1  | GConst        | gain                                         |
//! | 2  | TConst        | time                                         |
//! | 3  | FConst        | frequency                                    |
//! | 4  | DBConst       | int                                          |
//! | 5  | PanConst      | pan                                          |
//! | 6  | GADSR         | time, time, gain, time                       |
//! | 7  | FADSR         | frequency, frequency, time, time, gain, time |
//! | 8  | Note          | int                                          |
//! | 9  | RandomBipolar | detune                                       |

use crate::errors::*;
use crate::stream::{ByteStream, NUM_VALUES};
use crate::value::{Value, ValueEncoding, DETUNE, FREQUENCY, GAIN, INT, PAN, TIME};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the zero-field parameter type that selects a node's built-in default.
pub const DEFAULT_PARAM: &str = "Default";

/// A named group of value encodings.
#[derive(Debug, PartialEq)]
pub struct ParameterType {
    name: String,
    id: u8,
    fields: Vec<ValueEncoding>,
}

impl ParameterType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn fields(&self) -> &[ValueEncoding] {
        &self.fields
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    fn check_arity(&self, got: usize) -> Result<()> {
        if got != self.fields.len() {
            return Err(SynthCodeError::Validation(format!(
                "{} got {} arguments, expect {}",
                self.name,
                got,
                self.fields.len()
            )));
        }
        Ok(())
    }

    /// Encode one value per field into a [`Parameter`].
    pub fn param(self: &Arc<Self>, values: &[Value]) -> Result<Parameter> {
        self.check_arity(values.len())?;
        let fields = self
            .fields
            .iter()
            .zip(values)
            .map(|(encoding, &value)| encoding.encode(value))
            .collect::<Result<Vec<u8>>>()?;
        Ok(Parameter {
            ty: Arc::clone(self),
            fields,
        })
    }

    /// Format encoded field bytes as `Name(v1, v2, ...)`.
    pub fn decode(&self, values: &[u8]) -> Result<String> {
        self.check_arity(values.len())?;
        let decoded = self
            .fields
            .iter()
            .zip(values)
            .map(|(encoding, &value)| encoding.decode_rounded(value))
            .collect::<Result<Vec<String>>>()?;
        Ok(format!("{}({})", self.name, decoded.join(", ")))
    }
}

/// An encoded parameter, ready to be written after a node opcode.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    ty: Arc<ParameterType>,
    fields: Vec<u8>,
}

impl Parameter {
    pub fn param_type(&self) -> &Arc<ParameterType> {
        &self.ty
    }

    pub fn fields(&self) -> &[u8] {
        &self.fields
    }

    /// Append the type ID followed by every field byte.
    pub fn write(&self, stream: &mut ByteStream) -> Result<()> {
        stream.write(self.ty.id)?;
        stream.write_all(&self.fields)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty.decode(&self.fields) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}({:?})", self.ty.name, self.fields),
        }
    }
}

/// Assigns sequential IDs to parameter types.
#[derive(Debug, Default)]
pub struct ParamRegistry {
    types: Vec<Arc<ParameterType>>,
    by_name: HashMap<String, usize>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter type under the next free ID.
    pub fn register(&mut self, name: &str, fields: &[ValueEncoding]) -> Result<Arc<ParameterType>> {
        if self.by_name.contains_key(name) {
            return Err(SynthCodeError::Structural(format!(
                "duplicate parameter type: {:?}",
                name
            )));
        }
        let id = self.types.len();
        if id >= NUM_VALUES as usize {
            return Err(SynthCodeError::Structural(format!(
                "too many parameter types, cannot register {:?}",
                name
            )));
        }
        let ty = Arc::new(ParameterType {
            name: name.to_string(),
            id: id as u8,
            fields: fields.to_vec(),
        });
        self.types.push(Arc::clone(&ty));
        self.by_name.insert(name.to_string(), id);
        log::debug!("[PARAM] Registered {} as {} ({} fields)", name, id, fields.len());
        Ok(ty)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ParameterType>> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    pub fn by_id(&self, id: u8) -> Option<&Arc<ParameterType>> {
        self.types.get(id as usize)
    }

    /// Parameter types in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ParameterType>> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build the canonical registry together with handles to each type.
    pub fn standard() -> Result<(Self, StandardParams)> {
        let mut reg = Self::new();
        let params = StandardParams {
            default: reg.register(DEFAULT_PARAM, &[])?,
            gconst: reg.register("GConst", &[GAIN])?,
            tconst: reg.register("TConst", &[TIME])?,
            fconst: reg.register("FConst", &[FREQUENCY])?,
            dbconst: reg.register("DBConst", &[INT])?,
            panconst: reg.register("PanConst", &[PAN])?,
            gadsr: reg.register("GADSR", &[TIME, TIME, GAIN, TIME])?,
            fadsr: reg.register("FADSR", &[FREQUENCY, FREQUENCY, TIME, TIME, GAIN, TIME])?,
            note: reg.register("Note", &[INT])?,
            random_bipolar: reg.register("RandomBipolar", &[DETUNE])?,
        };
        Ok((reg, params))
    }
}

/// Handles to the canonical parameter types.
#[derive(Clone, Debug)]
pub struct StandardParams {
    /// Zero fields; tells the node to keep its built-in default.
    pub default: Arc<ParameterType>,
    /// Constant gain.
    pub gconst: Arc<ParameterType>,
    /// Constant time.
    pub tconst: Arc<ParameterType>,
    /// Constant frequency.
    pub fconst: Arc<ParameterType>,
    /// Constant integer (filter Q in dB).
    pub dbconst: Arc<ParameterType>,
    /// Constant stereo position.
    pub panconst: Arc<ParameterType>,
    /// Gain envelope: attack, decay, sustain, release.
    pub gadsr: Arc<ParameterType>,
    /// Frequency envelope: low, high, attack, decay, sustain, release.
    pub fadsr: Arc<ParameterType>,
    /// Semitone offset from the played note.
    pub note: Arc<ParameterType>,
    /// Random detune amplitude, drawn by the runtime per note.
    pub random_bipolar: Arc<ParameterType>,
}

/// Build a [`Parameter`] from a type handle and a list of values.
///
/// Each value goes through `Value::from`, so numbers and [`MIN`](crate::value::MIN)
/// mix freely:
///
/// ```
/// use synthcode_core::{param, registry, value::MIN};
/// let p = registry().params();
/// let env = param!(p.gadsr; MIN, 0.9, MIN, 0.9).unwrap();
/// assert_eq!(env.fields(), &[124, 50, 124, 50]);
/// ```
#[macro_export]
macro_rules! param {
    ($ty:expr $(; $($value:expr),* $(,)?)?) => {
        $ty.param(&[$($($crate::value::Value::from($value)),*)?])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{MAX, MIN};

    #[test]
    fn test_standard_ids_follow_registration_order() {
        let (reg, _) = ParamRegistry::standard().unwrap();
        let names: Vec<&str> = reg.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            [
                "Default",
                "GConst",
                "TConst",
                "FConst",
                "DBConst",
                "PanConst",
                "GADSR",
                "FADSR",
                "Note",
                "RandomBipolar"
            ]
        );
        for (i, ty) in reg.iter().enumerate() {
            assert_eq!(ty.id() as usize, i);
        }
        assert_eq!(reg.get("FADSR").unwrap().arity(), 6);
        assert_eq!(reg.by_id(8).unwrap().name(), "Note");
        assert!(reg.get("Nope").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut reg = ParamRegistry::new();
        reg.register("Level", &[GAIN]).unwrap();
        let err = reg.register("Level", &[TIME]).unwrap_err();
        assert!(matches!(err, SynthCodeError::Structural(_)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_arity_mismatch() {
        let (_, p) = ParamRegistry::standard().unwrap();
        let err = param!(p.gadsr; 0.1, 0.2, 0.3).unwrap_err();
        assert!(matches!(err, SynthCodeError::Validation(_)));
        assert!(param!(p.default; 1).is_err());
    }

    #[test]
    fn test_param_encodes_each_field() {
        let (_, p) = ParamRegistry::standard().unwrap();
        let env = param!(p.fadsr; 600, 1800, MIN, 0.3, MIN, 0.3).unwrap();
        assert_eq!(env.fields(), &[57, 39, 124, 68, 124, 68]);
        assert_eq!(env.param_type().name(), "FADSR");
    }

    #[test]
    fn test_write_emits_id_then_fields() {
        let (_, p) = ParamRegistry::standard().unwrap();
        let mut stream = ByteStream::new();
        param!(p.gconst; 0.5).unwrap().write(&mut stream).unwrap();
        param!(p.default).unwrap().write(&mut stream).unwrap();
        param!(p.note; -12).unwrap().write(&mut stream).unwrap();
        assert_eq!(stream.as_bytes(), &[1, 11, 0, 8, 50]);
    }

    #[test]
    fn test_raw_out_of_range_fails_on_write() {
        let (_, p) = ParamRegistry::standard().unwrap();
        let bad = p.gconst.param(&[Value::Raw(125)]).unwrap();
        let mut stream = ByteStream::new();
        assert!(matches!(
            bad.write(&mut stream),
            Err(SynthCodeError::Range(125))
        ));
    }

    #[test]
    fn test_decode_formats_fields() {
        let (_, p) = ParamRegistry::standard().unwrap();
        assert_eq!(
            p.gadsr.decode(&[124, 50, 124, 50]).unwrap(),
            "GADSR(0.0093, 0.91, 0.00047, 0.91)"
        );
        assert_eq!(
            p.fadsr.decode(&[57, 39, 124, 68, 124, 68]).unwrap(),
            "FADSR(590, 1800, 0.0093, 0.30, 0.00047, 0.30)"
        );
        assert_eq!(p.default.decode(&[]).unwrap(), "Default()");
        assert!(matches!(
            p.gadsr.decode(&[1, 2]),
            Err(SynthCodeError::Validation(_))
        ));
    }

    #[test]
    fn test_display_uses_rounded_decoding() {
        let (_, p) = ParamRegistry::standard().unwrap();
        let gain = param!(p.gconst; MAX).unwrap();
        assert_eq!(gain.to_string(), "GConst(1.00)");
    }
}
