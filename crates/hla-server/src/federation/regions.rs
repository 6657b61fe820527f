//! Data distribution regions.
//!
//! A region spans the whole range of every dimension it has no committed
//! bounds for, so two regions overlap when they intersect on every
//! dimension both have committed bounds for.

use std::collections::BTreeMap;

use hla_proto::{
    AttributeRegions, DimensionHandle, DimensionHandleSet, ErrorKind, FederateHandle, Handle,
    LogicalTime, ObjectInstanceHandle, RangeBounds, RegionExtents, RegionHandle, RegionHandleSet,
    RtiError,
};
use tracing::debug;

use super::Federation;

#[derive(Debug, Clone)]
pub(super) struct Region {
    pub owner: FederateHandle,
    pub dimensions: DimensionHandleSet,
    pub bounds: BTreeMap<DimensionHandle, RangeBounds>,
}

impl Region {
    fn overlaps(&self, other: &Self) -> bool {
        self.bounds
            .iter()
            .all(|(dimension, mine)| other.bounds.get(dimension).is_none_or(|theirs| mine.intersects(theirs)))
    }
}

impl<T: LogicalTime> Federation<T> {
    fn region(&self, region: RegionHandle) -> Result<&Region, RtiError> {
        self.regions
            .get(&region)
            .ok_or_else(|| RtiError::new(ErrorKind::InvalidRegion, region.to_string()))
    }

    fn owned_region(&self, federate: FederateHandle, region: RegionHandle) -> Result<&Region, RtiError> {
        let found = self.region(region)?;
        if found.owner != federate {
            return Err(RtiError::new(ErrorKind::RegionNotCreatedByThisFederate, region.to_string()));
        }
        Ok(found)
    }

    pub(super) fn check_regions_owned(
        &self,
        federate: FederateHandle,
        regions: &RegionHandleSet,
    ) -> Result<(), RtiError> {
        regions.iter().try_for_each(|r| self.owned_region(federate, r).map(|_| ()))
    }

    /// Some region of `a` overlaps some region of `b`.
    pub(super) fn overlaps(&self, a: &RegionHandleSet, b: &RegionHandleSet) -> bool {
        a.iter().filter_map(|r| self.regions.get(&r)).any(|mine| {
            b.iter().filter_map(|r| self.regions.get(&r)).any(|theirs| mine.overlaps(theirs))
        })
    }

    pub(super) fn create_region(
        &mut self,
        federate: FederateHandle,
        dimensions: &DimensionHandleSet,
    ) -> Result<RegionHandle, RtiError> {
        for dimension in dimensions {
            self.model.dimension(dimension)?;
        }
        self.next_region += 1;
        let region = RegionHandle::from_raw(self.next_region);
        self.regions.insert(
            region,
            Region { owner: federate, dimensions: dimensions.clone(), bounds: BTreeMap::new() },
        );
        debug!(%federate, %region, dimensions = dimensions.len(), "region created");
        Ok(region)
    }

    /// All-or-nothing: a single bad extent rejects the whole commit.
    pub(super) fn commit_region_modifications(
        &mut self,
        federate: FederateHandle,
        extents: &[RegionExtents],
    ) -> Result<(), RtiError> {
        for extent in extents {
            let region = self.owned_region(federate, extent.region)?;
            for (dimension, bounds) in &extent.bounds {
                if !region.dimensions.contains(*dimension) {
                    return Err(RtiError::new(
                        ErrorKind::RegionDoesNotContainSpecifiedDimension,
                        format!("{dimension} not in {}", extent.region),
                    ));
                }
                let upper_bound = self.model.dimension(*dimension)?.upper_bound;
                if bounds.upper() > upper_bound {
                    return Err(RtiError::new(
                        ErrorKind::InvalidRangeBound,
                        format!("[{}, {}) exceeds {upper_bound} on {dimension}", bounds.lower(), bounds.upper()),
                    ));
                }
            }
        }
        for extent in extents {
            if let Some(region) = self.regions.get_mut(&extent.region) {
                region.bounds.extend(extent.bounds.iter().copied());
            }
        }
        Ok(())
    }

    pub(super) fn delete_region(&mut self, federate: FederateHandle, region: RegionHandle) -> Result<(), RtiError> {
        self.owned_region(federate, region)?;
        let in_use = self.federates.values().any(|r| r.declarations.uses_region(region))
            || self
                .objects
                .values()
                .any(|o| o.update_regions.values().any(|set| set.contains(region)));
        if in_use {
            return Err(RtiError::new(ErrorKind::RegionInUseForUpdateOrSubscription, region.to_string()));
        }
        self.regions.remove(&region);
        debug!(%federate, %region, "region deleted");
        Ok(())
    }

    /// `associateRegionsForUpdates` or, with `associate` false,
    /// `unassociateRegionsForUpdates`.
    pub(super) fn associate_regions(
        &mut self,
        federate: FederateHandle,
        object: ObjectInstanceHandle,
        associations: &[AttributeRegions],
        associate: bool,
    ) -> Result<(), RtiError> {
        self.check_known(federate, object)?;
        let class = self.instance(object)?.class;
        for association in associations {
            self.model.check_attributes(class, association.attributes.iter())?;
            self.check_regions_owned(federate, &association.regions)?;
        }
        let Some(instance) = self.objects.get_mut(&object) else {
            return Err(RtiError::new(ErrorKind::ObjectInstanceNotKnown, object.to_string()));
        };
        for association in associations {
            for attribute in &association.attributes {
                let set = instance.update_regions.entry(attribute).or_default();
                if associate {
                    set.extend_from(&association.regions);
                } else {
                    *set = set.difference(&association.regions);
                }
            }
        }
        instance.update_regions.retain(|_, set| !set.is_empty());
        Ok(())
    }

    /// Delete every region `federate` created, together with every use of
    /// them.
    pub(super) fn forget_regions_of(&mut self, federate: FederateHandle) {
        let owned: RegionHandleSet =
            self.regions.iter().filter(|(_, r)| r.owner == federate).map(|(h, _)| *h).collect();
        if owned.is_empty() {
            return;
        }
        self.regions.retain(|_, r| r.owner != federate);
        for instance in self.objects.values_mut() {
            for set in instance.update_regions.values_mut() {
                *set = set.difference(&owned);
            }
            instance.update_regions.retain(|_, set| !set.is_empty());
        }
    }
}
