//! The process-wide parameter and node tables.

use crate::errors::*;
use crate::node::NodeRegistry;
use crate::param::{ParamRegistry, Parameter, StandardParams};
use std::sync::OnceLock;

/// Parameter types and node opcodes used to build programs.
#[derive(Debug)]
pub struct Registry {
    param_types: ParamRegistry,
    params: StandardParams,
    nodes: NodeRegistry,
    default: Parameter,
}

impl Registry {
    /// Register the canonical parameter types, then the canonical nodes.
    ///
    /// Both orders are fixed: they decide the IDs written to every program.
    pub fn standard() -> Result<Self> {
        let (param_types, params) = ParamRegistry::standard()?;
        let nodes = NodeRegistry::standard()?;
        let default = params.default.param(&[])?;
        log::debug!(
            "[REGISTRY] {} parameter types, {} nodes",
            param_types.len(),
            nodes.len()
        );
        Ok(Self {
            param_types,
            params,
            nodes,
            default,
        })
    }

    /// Handles to the canonical parameter types.
    pub fn params(&self) -> &StandardParams {
        &self.params
    }

    pub fn param_types(&self) -> &ParamRegistry {
        &self.param_types
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    /// The `Default` parameter written for omitted node keywords.
    pub fn default_param(&self) -> &Parameter {
        &self.default
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The shared standard registry, built on first use and read-only afterwards.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| match Registry::standard() {
        Ok(registry) => registry,
        Err(err) => panic!("standard registry is inconsistent: {}", err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_registry_is_built_once() {
        let a = registry() as *const Registry;
        let b = registry() as *const Registry;
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_param_has_no_fields() {
        let reg = Registry::standard().unwrap();
        assert_eq!(reg.default_param().param_type().id(), 0);
        assert!(reg.default_param().fields().is_empty());
        assert_eq!(reg.param_types().len(), 10);
        assert_eq!(reg.nodes().len(), 8);
    }
}
