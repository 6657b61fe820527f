//! Object model description supplied to `createFederationExecution`.
//!
//! Parsing FED/FDD files is out of scope; callers describe the object model
//! directly, either with the builder methods below or by deserialising a
//! [`FomModule`] with serde. Class names are simple names; the hierarchy is
//! expressed through `parent`.

use serde::{Deserialize, Serialize};

/// One object model module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FomModule {
    /// Module name, used in error messages.
    pub name: String,
    /// Object classes, parents before children.
    #[serde(default)]
    pub object_classes: Vec<ObjectClassDef>,
    /// Interaction classes, parents before children.
    #[serde(default)]
    pub interaction_classes: Vec<InteractionClassDef>,
    /// DDM dimensions.
    #[serde(default)]
    pub dimensions: Vec<DimensionDef>,
}

/// Object class definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectClassDef {
    /// Class name, unique within the federation.
    pub name: String,
    /// Superclass name.
    #[serde(default)]
    pub parent: Option<String>,
    /// Attributes declared by this class (inherited ones are implicit).
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

/// Attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name, unique within its class hierarchy.
    pub name: String,
    /// Owned by the RTI itself instead of by any federate.
    #[serde(default)]
    pub rti_owned: bool,
}

/// Interaction class definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionClassDef {
    /// Class name, unique within the federation.
    pub name: String,
    /// Superclass name.
    #[serde(default)]
    pub parent: Option<String>,
    /// Parameters declared by this class.
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// DDM dimension definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDef {
    /// Dimension name.
    pub name: String,
    /// Exclusive upper bound of every range on this dimension.
    pub upper_bound: u64,
}

impl FomModule {
    /// Empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Add an object class with federate-owned attributes.
    #[must_use]
    pub fn object_class(mut self, name: &str, parent: Option<&str>, attributes: &[&str]) -> Self {
        self.object_classes.push(ObjectClassDef {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            attributes: attributes
                .iter()
                .map(|a| AttributeDef { name: (*a).to_string(), rti_owned: false })
                .collect(),
        });
        self
    }

    /// Add an RTI-owned attribute to the most recently added object class.
    #[must_use]
    pub fn rti_owned_attribute(mut self, name: &str) -> Self {
        if let Some(class) = self.object_classes.last_mut() {
            class.attributes.push(AttributeDef { name: name.to_string(), rti_owned: true });
        }
        self
    }

    /// Add an interaction class.
    #[must_use]
    pub fn interaction_class(
        mut self,
        name: &str,
        parent: Option<&str>,
        parameters: &[&str],
    ) -> Self {
        self.interaction_classes.push(InteractionClassDef {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            parameters: parameters.iter().map(|p| (*p).to_string()).collect(),
        });
        self
    }

    /// Add a dimension.
    #[must_use]
    pub fn dimension(mut self, name: &str, upper_bound: u64) -> Self {
        self.dimensions.push(DimensionDef { name: name.to_string(), upper_bound });
        self
    }

    /// True if the module defines nothing.
    pub fn is_empty(&self) -> bool {
        self.object_classes.is_empty()
            && self.interaction_classes.is_empty()
            && self.dimensions.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_definitions() {
        let fom = FomModule::new("test")
            .object_class("Vehicle", None, &["position"])
            .rti_owned_attribute("privilegeToDelete")
            .object_class("Car", Some("Vehicle"), &["gear"])
            .interaction_class("Collision", None, &["force"])
            .dimension("x", 100);

        assert_eq!(fom.object_classes.len(), 2);
        assert!(fom.object_classes[0].attributes[1].rti_owned);
        assert_eq!(fom.object_classes[1].parent.as_deref(), Some("Vehicle"));
        assert!(!fom.is_empty());
        assert!(FomModule::new("empty").is_empty());
    }

    #[test]
    fn deserialises_with_defaults() {
        let fom = FomModule::new("m").object_class("A", None, &["a"]);
        let mut buf = Vec::new();
        ciborium::into_writer(&fom, &mut buf).unwrap();
        let back: FomModule = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(back, fom);
    }
}
