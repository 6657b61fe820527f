//! DDM regions created by this federate.
//!
//! Range bounds are edited locally with `set_range_bounds` and only become
//! visible to the RTI on `commitRegionModifications`. A dimension without
//! committed bounds spans its whole range.

use std::collections::BTreeMap;

use hla_proto::{
    DimensionHandle, DimensionHandleSet, ErrorKind, RangeBounds, RegionExtents, RegionHandle,
    RegionHandleSet, RtiError,
};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct Region {
    dimensions: DimensionHandleSet,
    committed: BTreeMap<DimensionHandle, RangeBounds>,
    pending: BTreeMap<DimensionHandle, RangeBounds>,
}

/// Regions owned by one federate.
#[derive(Debug, Clone, Default)]
pub struct RegionRegistry {
    regions: BTreeMap<RegionHandle, Region>,
}

impl RegionRegistry {
    fn region(&self, region: RegionHandle) -> Result<&Region, RtiError> {
        self.regions.get(&region).ok_or_else(|| {
            RtiError::new(ErrorKind::RegionNotCreatedByThisFederate, region.to_string())
        })
    }

    /// Every region must have been created by this federate.
    pub fn check_owned(&self, regions: &RegionHandleSet) -> Result<(), RtiError> {
        regions.iter().try_for_each(|r| self.region(r).map(|_| ()))
    }

    /// Dimensions of `region`.
    pub fn dimensions(&self, region: RegionHandle) -> Result<&DimensionHandleSet, RtiError> {
        self.region(region).map(|r| &r.dimensions)
    }

    /// `getRangeBounds`: pending bounds win over committed ones.
    pub fn range_bounds(
        &self,
        region: RegionHandle,
        dimension: DimensionHandle,
    ) -> Result<Option<RangeBounds>, RtiError> {
        let r = self.region(region)?;
        if !r.dimensions.contains(dimension) {
            return Err(RtiError::new(
                ErrorKind::RegionDoesNotContainSpecifiedDimension,
                format!("{dimension} not in {region}"),
            ));
        }
        Ok(r.pending.get(&dimension).or_else(|| r.committed.get(&dimension)).copied())
    }

    /// `setRangeBounds`. Takes effect at the next commit.
    pub fn set_range_bounds(
        &mut self,
        region: RegionHandle,
        dimension: DimensionHandle,
        bounds: RangeBounds,
    ) -> Result<(), RtiError> {
        let r = self.regions.get_mut(&region).ok_or_else(|| {
            RtiError::new(ErrorKind::RegionNotCreatedByThisFederate, region.to_string())
        })?;
        if !r.dimensions.contains(dimension) {
            return Err(RtiError::new(
                ErrorKind::RegionDoesNotContainSpecifiedDimension,
                format!("{dimension} not in {region}"),
            ));
        }
        r.pending.insert(dimension, bounds);
        Ok(())
    }

    /// Extents to send with `commitRegionModifications`.
    pub fn extents(&self, regions: &RegionHandleSet) -> Result<Vec<RegionExtents>, RtiError> {
        regions
            .iter()
            .map(|handle| {
                let r = self.region(handle)?;
                let mut bounds = r.committed.clone();
                bounds.extend(r.pending.iter().map(|(d, b)| (*d, *b)));
                Ok(RegionExtents { region: handle, bounds: bounds.into_iter().collect() })
            })
            .collect()
    }

    /// Committed extents of `region`.
    pub fn committed(&self, region: RegionHandle) -> Result<RegionExtents, RtiError> {
        let r = self.region(region)?;
        Ok(RegionExtents {
            region,
            bounds: r.committed.iter().map(|(d, b)| (*d, *b)).collect(),
        })
    }

    /// Record a region created by the RTI for this federate.
    pub fn created(&mut self, region: RegionHandle, dimensions: DimensionHandleSet) {
        debug!(%region, dimensions = dimensions.len(), "region created");
        self.regions.insert(region, Region { dimensions, ..Region::default() });
    }

    /// Record a successful commit.
    pub fn committed_all(&mut self, regions: &RegionHandleSet) {
        for handle in regions {
            if let Some(r) = self.regions.get_mut(&handle) {
                let pending = std::mem::take(&mut r.pending);
                r.committed.extend(pending);
            }
        }
    }

    /// Record a successful `deleteRegion`.
    pub fn deleted(&mut self, region: RegionHandle) {
        debug!(%region, "region deleted");
        self.regions.remove(&region);
    }

    /// Every region handle owned by this federate.
    pub fn handles(&self) -> RegionHandleSet {
        self.regions.keys().copied().collect()
    }
}
