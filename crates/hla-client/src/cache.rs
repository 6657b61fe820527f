//! Handles the federate has already received from the RTI.
//!
//! Object model handles never change while a federate stays in one
//! federation, so lookups are answered locally after the first round trip.
//! The cache is emptied whenever the federate joins, resigns or loses the
//! connection.

use std::collections::HashMap;

use hla_proto::{
    AttributeHandle, DimensionHandle, InteractionClassHandle, ObjectClassHandle, ParameterHandle,
};

/// Name to handle cache for one federation's object model.
#[derive(Debug, Default)]
pub struct HandleCache {
    object_classes: HashMap<String, ObjectClassHandle>,
    attributes: HashMap<(ObjectClassHandle, String), AttributeHandle>,
    interaction_classes: HashMap<String, InteractionClassHandle>,
    parameters: HashMap<(InteractionClassHandle, String), ParameterHandle>,
    dimensions: HashMap<String, DimensionHandle>,
}

impl HandleCache {
    /// Cached object class.
    pub fn object_class(&self, name: &str) -> Option<ObjectClassHandle> {
        self.object_classes.get(name).copied()
    }

    /// Remember an object class.
    pub fn insert_object_class(&mut self, name: &str, class: ObjectClassHandle) {
        self.object_classes.insert(name.to_string(), class);
    }

    /// Cached attribute of `class`.
    pub fn attribute(&self, class: ObjectClassHandle, name: &str) -> Option<AttributeHandle> {
        self.attributes.get(&(class, name.to_string())).copied()
    }

    /// Remember an attribute of `class`.
    pub fn insert_attribute(
        &mut self,
        class: ObjectClassHandle,
        name: &str,
        attribute: AttributeHandle,
    ) {
        self.attributes.insert((class, name.to_string()), attribute);
    }

    /// Cached interaction class.
    pub fn interaction_class(&self, name: &str) -> Option<InteractionClassHandle> {
        self.interaction_classes.get(name).copied()
    }

    /// Remember an interaction class.
    pub fn insert_interaction_class(&mut self, name: &str, class: InteractionClassHandle) {
        self.interaction_classes.insert(name.to_string(), class);
    }

    /// Cached parameter of `class`.
    pub fn parameter(&self, class: InteractionClassHandle, name: &str) -> Option<ParameterHandle> {
        self.parameters.get(&(class, name.to_string())).copied()
    }

    /// Remember a parameter of `class`.
    pub fn insert_parameter(
        &mut self,
        class: InteractionClassHandle,
        name: &str,
        parameter: ParameterHandle,
    ) {
        self.parameters.insert((class, name.to_string()), parameter);
    }

    /// Cached dimension.
    pub fn dimension(&self, name: &str) -> Option<DimensionHandle> {
        self.dimensions.get(name).copied()
    }

    /// Remember a dimension.
    pub fn insert_dimension(&mut self, name: &str, dimension: DimensionHandle) {
        self.dimensions.insert(name.to_string(), dimension);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.object_classes.clear();
        self.attributes.clear();
        self.interaction_classes.clear();
        self.parameters.clear();
        self.dimensions.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.object_classes.len()
            + self.attributes.len()
            + self.interaction_classes.len()
            + self.parameters.len()
            + self.dimensions.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
