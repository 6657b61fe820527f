//! Object model of one federation execution.
//!
//! Built once from the FOM modules passed to `createFederationExecution`.
//! Handles are dense and start at 1. Attributes and parameters keep the
//! handle of the class that declared them, so a subclass shares its
//! parent's handles for inherited members.

use std::collections::BTreeMap;

use hla_proto::{
    AttributeHandle, AttributeHandleSet, DimensionHandle, ErrorKind, FomModule, Handle,
    InteractionClassHandle, ObjectClassHandle, ParameterHandle, RtiError,
};
use thiserror::Error;

const OBJECT_ROOT: &str = "HLAobjectRoot";
const INTERACTION_ROOT: &str = "HLAinteractionRoot";

/// Reasons a set of FOM modules cannot form an object model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectModelError {
    /// No module, or only empty ones.
    #[error("no FOM module declares anything")]
    Empty,

    /// A class names a parent nobody declared before it.
    #[error("class {class} extends unknown class {parent}")]
    UnknownParent {
        /// Declaring class.
        class: String,
        /// Missing parent.
        parent: String,
    },

    /// The same name declared twice in one namespace.
    #[error("{what} {name} is declared twice")]
    Duplicate {
        /// Namespace, for example "object class".
        what: &'static str,
        /// Offending name.
        name: String,
    },
}

impl From<ObjectModelError> for RtiError {
    fn from(err: ObjectModelError) -> Self {
        let kind = match err {
            ObjectModelError::Empty => ErrorKind::CouldNotOpenFDD,
            ObjectModelError::UnknownParent { .. } | ObjectModelError::Duplicate { .. } => {
                ErrorKind::ErrorReadingFDD
            },
        };
        Self::new(kind, err.to_string())
    }
}

/// An object class with its resolved attribute set.
#[derive(Debug, Clone)]
pub struct ObjectClassInfo {
    /// Simple name.
    pub name: String,
    /// Dotted path from `HLAobjectRoot`.
    pub qualified_name: String,
    /// Superclass.
    pub parent: Option<ObjectClassHandle>,
    /// Attributes declared here or inherited, by name.
    pub attributes: BTreeMap<String, AttributeHandle>,
    /// Attributes only the RTI may own.
    pub rti_owned: AttributeHandleSet,
}

impl ObjectClassInfo {
    /// Every attribute of the class.
    pub fn attribute_set(&self) -> AttributeHandleSet {
        self.attributes.values().copied().collect()
    }
}

/// An interaction class with its resolved parameter set.
#[derive(Debug, Clone)]
pub struct InteractionClassInfo {
    /// Simple name.
    pub name: String,
    /// Dotted path from `HLAinteractionRoot`.
    pub qualified_name: String,
    /// Superclass.
    pub parent: Option<InteractionClassHandle>,
    /// Parameters declared here or inherited, by name.
    pub parameters: BTreeMap<String, ParameterHandle>,
}

/// A routing space dimension.
#[derive(Debug, Clone)]
pub struct DimensionInfo {
    /// Name.
    pub name: String,
    /// Exclusive upper bound of every range on this dimension.
    pub upper_bound: u64,
}

/// Merged object model of a federation.
#[derive(Debug, Clone)]
pub struct ObjectModel {
    object_classes: Vec<ObjectClassInfo>,
    interaction_classes: Vec<InteractionClassInfo>,
    dimensions: Vec<DimensionInfo>,
    attribute_names: BTreeMap<AttributeHandle, String>,
    parameter_names: BTreeMap<ParameterHandle, String>,
}

impl ObjectModel {
    /// Merge `modules` in order. A parent must be declared before its
    /// children, possibly in an earlier module.
    pub fn build(modules: &[FomModule]) -> Result<Self, ObjectModelError> {
        if modules.iter().all(FomModule::is_empty) {
            return Err(ObjectModelError::Empty);
        }

        let mut model = Self {
            object_classes: Vec::new(),
            interaction_classes: Vec::new(),
            dimensions: Vec::new(),
            attribute_names: BTreeMap::new(),
            parameter_names: BTreeMap::new(),
        };

        for module in modules {
            for def in &module.object_classes {
                model.add_object_class(&def.name, def.parent.as_deref(), &def.attributes)?;
            }
            for def in &module.interaction_classes {
                model.add_interaction_class(&def.name, def.parent.as_deref(), &def.parameters)?;
            }
            for def in &module.dimensions {
                if model.dimensions.iter().any(|d| d.name == def.name) {
                    return Err(ObjectModelError::Duplicate {
                        what: "dimension",
                        name: def.name.clone(),
                    });
                }
                model
                    .dimensions
                    .push(DimensionInfo { name: def.name.clone(), upper_bound: def.upper_bound });
            }
        }
        Ok(model)
    }

    fn add_object_class(
        &mut self,
        name: &str,
        parent: Option<&str>,
        attributes: &[hla_proto::fom::AttributeDef],
    ) -> Result<(), ObjectModelError> {
        if self.object_classes.iter().any(|c| c.name == name) {
            return Err(ObjectModelError::Duplicate { what: "object class", name: name.into() });
        }
        let (parent, mut declared, mut rti_owned, prefix) = match parent {
            Some(parent_name) => {
                let handle = self.object_class_handle(parent_name).map_err(|_| {
                    ObjectModelError::UnknownParent {
                        class: name.into(),
                        parent: parent_name.into(),
                    }
                })?;
                let info = &self.object_classes[index(handle)];
                (
                    Some(handle),
                    info.attributes.clone(),
                    info.rti_owned.clone(),
                    info.qualified_name.clone(),
                )
            },
            None => (None, BTreeMap::new(), AttributeHandleSet::new(), OBJECT_ROOT.to_string()),
        };

        for attribute in attributes {
            if declared.contains_key(&attribute.name) {
                return Err(ObjectModelError::Duplicate {
                    what: "attribute",
                    name: format!("{name}.{}", attribute.name),
                });
            }
            let handle = AttributeHandle::from_raw(next_raw(self.attribute_names.len()));
            self.attribute_names.insert(handle, attribute.name.clone());
            declared.insert(attribute.name.clone(), handle);
            if attribute.rti_owned {
                rti_owned.add(handle);
            }
        }

        self.object_classes.push(ObjectClassInfo {
            name: name.into(),
            qualified_name: format!("{prefix}.{name}"),
            parent,
            attributes: declared,
            rti_owned,
        });
        Ok(())
    }

    fn add_interaction_class(
        &mut self,
        name: &str,
        parent: Option<&str>,
        parameters: &[String],
    ) -> Result<(), ObjectModelError> {
        if self.interaction_classes.iter().any(|c| c.name == name) {
            return Err(ObjectModelError::Duplicate {
                what: "interaction class",
                name: name.into(),
            });
        }
        let (parent, mut declared, prefix) = match parent {
            Some(parent_name) => {
                let handle = self.interaction_class_handle(parent_name).map_err(|_| {
                    ObjectModelError::UnknownParent {
                        class: name.into(),
                        parent: parent_name.into(),
                    }
                })?;
                let info = &self.interaction_classes[index(handle)];
                (Some(handle), info.parameters.clone(), info.qualified_name.clone())
            },
            None => (None, BTreeMap::new(), INTERACTION_ROOT.to_string()),
        };

        for parameter in parameters {
            if declared.contains_key(parameter) {
                return Err(ObjectModelError::Duplicate {
                    what: "parameter",
                    name: format!("{name}.{parameter}"),
                });
            }
            let handle = ParameterHandle::from_raw(next_raw(self.parameter_names.len()));
            self.parameter_names.insert(handle, parameter.clone());
            declared.insert(parameter.clone(), handle);
        }

        self.interaction_classes.push(InteractionClassInfo {
            name: name.into(),
            qualified_name: format!("{prefix}.{name}"),
            parent,
            parameters: declared,
        });
        Ok(())
    }

    /// Object class by handle.
    pub fn object_class(&self, class: ObjectClassHandle) -> Result<&ObjectClassInfo, RtiError> {
        lookup(&self.object_classes, class)
            .ok_or_else(|| RtiError::new(ErrorKind::ObjectClassNotDefined, class.to_string()))
    }

    /// Object class by simple or qualified name.
    pub fn object_class_handle(&self, name: &str) -> Result<ObjectClassHandle, RtiError> {
        self.object_classes
            .iter()
            .position(|c| c.name == name || c.qualified_name == name)
            .map(|i| ObjectClassHandle::from_raw(next_raw(i)))
            .ok_or_else(|| RtiError::new(ErrorKind::NameNotFound, name))
    }

    /// Attribute of `class` by name.
    pub fn attribute_handle(
        &self,
        class: ObjectClassHandle,
        name: &str,
    ) -> Result<AttributeHandle, RtiError> {
        self.object_class(class)?
            .attributes
            .get(name)
            .copied()
            .ok_or_else(|| RtiError::new(ErrorKind::NameNotFound, name))
    }

    /// Name of an attribute of `class`.
    pub fn attribute_name(
        &self,
        class: ObjectClassHandle,
        attribute: AttributeHandle,
    ) -> Result<&str, RtiError> {
        self.check_attributes(class, std::iter::once(attribute))?;
        self.attribute_names
            .get(&attribute)
            .map(String::as_str)
            .ok_or_else(|| attribute.not_found())
    }

    /// Fails with `AttributeNotDefined` unless every attribute belongs to
    /// `class`.
    pub fn check_attributes(
        &self,
        class: ObjectClassHandle,
        attributes: impl IntoIterator<Item = AttributeHandle>,
    ) -> Result<(), RtiError> {
        let info = self.object_class(class)?;
        for attribute in attributes {
            if !info.attributes.values().any(|a| *a == attribute) {
                return Err(RtiError::new(
                    ErrorKind::AttributeNotDefined,
                    format!("{attribute} on {}", info.name),
                ));
            }
        }
        Ok(())
    }

    /// `class` followed by each of its ancestors.
    pub fn object_lineage(&self, class: ObjectClassHandle) -> Vec<ObjectClassHandle> {
        let mut lineage = Vec::new();
        let mut next = Some(class);
        while let Some(current) = next {
            lineage.push(current);
            next = lookup(&self.object_classes, current).and_then(|c| c.parent);
        }
        lineage
    }

    /// Every class that is `class` or one of its descendants.
    pub fn object_subclasses(&self, class: ObjectClassHandle) -> Vec<ObjectClassHandle> {
        (0..self.object_classes.len())
            .map(|i| ObjectClassHandle::from_raw(next_raw(i)))
            .filter(|candidate| self.object_lineage(*candidate).contains(&class))
            .collect()
    }

    /// Interaction class by handle.
    pub fn interaction_class(
        &self,
        class: InteractionClassHandle,
    ) -> Result<&InteractionClassInfo, RtiError> {
        lookup(&self.interaction_classes, class)
            .ok_or_else(|| RtiError::new(ErrorKind::InteractionClassNotDefined, class.to_string()))
    }

    /// Interaction class by simple or qualified name.
    pub fn interaction_class_handle(&self, name: &str) -> Result<InteractionClassHandle, RtiError> {
        self.interaction_classes
            .iter()
            .position(|c| c.name == name || c.qualified_name == name)
            .map(|i| InteractionClassHandle::from_raw(next_raw(i)))
            .ok_or_else(|| RtiError::new(ErrorKind::NameNotFound, name))
    }

    /// Parameter of `class` by name.
    pub fn parameter_handle(
        &self,
        class: InteractionClassHandle,
        name: &str,
    ) -> Result<ParameterHandle, RtiError> {
        self.interaction_class(class)?
            .parameters
            .get(name)
            .copied()
            .ok_or_else(|| RtiError::new(ErrorKind::NameNotFound, name))
    }

    /// Name of a parameter of `class`.
    pub fn parameter_name(
        &self,
        class: InteractionClassHandle,
        parameter: ParameterHandle,
    ) -> Result<&str, RtiError> {
        let info = self.interaction_class(class)?;
        if !info.parameters.values().any(|p| *p == parameter) {
            return Err(RtiError::new(
                ErrorKind::InteractionParameterNotDefined,
                format!("{parameter} on {}", info.name),
            ));
        }
        self.parameter_names
            .get(&parameter)
            .map(String::as_str)
            .ok_or_else(|| parameter.not_found())
    }

    /// True if `parameter` is declared on `class` or inherited by it.
    pub fn has_parameter(&self, class: InteractionClassHandle, parameter: ParameterHandle) -> bool {
        lookup(&self.interaction_classes, class)
            .is_some_and(|info| info.parameters.values().any(|p| *p == parameter))
    }

    /// `class` followed by each of its ancestors.
    pub fn interaction_lineage(&self, class: InteractionClassHandle) -> Vec<InteractionClassHandle> {
        let mut lineage = Vec::new();
        let mut next = Some(class);
        while let Some(current) = next {
            lineage.push(current);
            next = lookup(&self.interaction_classes, current).and_then(|c| c.parent);
        }
        lineage
    }

    /// Dimension by handle.
    pub fn dimension(&self, dimension: DimensionHandle) -> Result<&DimensionInfo, RtiError> {
        lookup(&self.dimensions, dimension)
            .ok_or_else(|| RtiError::new(ErrorKind::InvalidDimensionHandle, dimension.to_string()))
    }

    /// Dimension by name.
    pub fn dimension_handle(&self, name: &str) -> Result<DimensionHandle, RtiError> {
        self.dimensions
            .iter()
            .position(|d| d.name == name)
            .map(|i| DimensionHandle::from_raw(next_raw(i)))
            .ok_or_else(|| RtiError::new(ErrorKind::NameNotFound, name))
    }
}

fn next_raw(len: usize) -> u32 {
    u32::try_from(len + 1).unwrap_or(u32::MAX)
}

fn index<H: Handle>(handle: H) -> usize {
    handle.raw().saturating_sub(1) as usize
}

fn lookup<H: Handle, V>(entries: &[V], handle: H) -> Option<&V> {
    if handle.raw() == 0 { None } else { entries.get(index(handle)) }
}
