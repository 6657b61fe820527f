//! Handle/value containers for attribute updates and interaction
//! parameters.
//!
//! A [`HandleValueMap`] owns every value it stores. Values are [`Bytes`], so
//! handing an owned `Vec<u8>` or `Bytes` to [`HandleValueMap::add`] adopts
//! the buffer without copying; [`HandleValueMap::add_copied`] copies a
//! borrowed slice.
//!
//! Entries keep the position they were first added at; replacing a value
//! does not move it. Callers must not depend on that ordering beyond
//! lock-step enumeration with [`HandleValueMap::handle_at`] and
//! [`HandleValueMap::value_at`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorKind, RtiError},
    handle::{AttributeHandle, Handle, ParameterHandle, RegionHandle},
    types::{OrderType, TransportationType},
};

/// Attribute values of one update or reflection.
pub type AttributeValues = HandleValueMap<AttributeHandle>;
/// Parameter values of one interaction.
pub type ParameterValues = HandleValueMap<ParameterHandle>;

/// Optional capacity limits of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLimits {
    /// Maximum number of entries.
    pub max_count: usize,
    /// Maximum length of one value in bytes.
    pub max_value_length: usize,
}

/// One (handle, value) entry with optional per-entry metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "H: Serialize", deserialize = "H: Deserialize<'de>"))]
pub struct HandleValueEntry<H: Handle> {
    handle: H,
    value: Bytes,
    transportation: Option<TransportationType>,
    order: Option<OrderType>,
    region: Option<RegionHandle>,
}

impl<H: Handle> HandleValueEntry<H> {
    /// Entry handle.
    pub fn handle(&self) -> H {
        self.handle
    }

    /// Entry value.
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Requested transportation, if set.
    pub fn transportation(&self) -> Option<TransportationType> {
        self.transportation
    }

    /// Delivery order, if set.
    pub fn order(&self) -> Option<OrderType> {
        self.order
    }

    /// Associated region, if set.
    pub fn region(&self) -> Option<RegionHandle> {
        self.region
    }
}

/// Ordered map from handles to opaque byte values.
///
/// Decoding rebuilds the map through [`HandleValueMap::add`], so a decoded
/// map honours its own limits and never holds a handle twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    bound(serialize = "H: Serialize", deserialize = "H: Deserialize<'de>"),
    try_from = "RawHandleValueMap<H>"
)]
pub struct HandleValueMap<H: Handle> {
    entries: Vec<HandleValueEntry<H>>,
    limits: Option<ValueLimits>,
}

/// Wire form of [`HandleValueMap`] before validation.
#[derive(Deserialize)]
#[serde(bound(deserialize = "H: Deserialize<'de>"))]
struct RawHandleValueMap<H: Handle> {
    entries: Vec<HandleValueEntry<H>>,
    limits: Option<ValueLimits>,
}

impl<H: Handle> TryFrom<RawHandleValueMap<H>> for HandleValueMap<H> {
    type Error = RtiError;

    fn try_from(raw: RawHandleValueMap<H>) -> Result<Self, Self::Error> {
        let mut map = Self { entries: Vec::with_capacity(raw.entries.len()), limits: raw.limits };
        for entry in raw.entries {
            if map.contains(entry.handle) {
                return Err(RtiError::new(
                    ErrorKind::CouldNotDecode,
                    format!("duplicate handle {}", entry.handle),
                ));
            }
            map.add(entry.handle, entry.value.clone())?;
            if let Some(last) = map.entries.last_mut() {
                *last = entry;
            }
        }
        Ok(map)
    }
}

impl<H: Handle> Default for HandleValueMap<H> {
    fn default() -> Self {
        Self { entries: Vec::new(), limits: None }
    }
}

fn out_of_bounds(index: usize, len: usize) -> RtiError {
    RtiError::new(ErrorKind::ArrayIndexOutOfBounds, format!("index {index} of {len}"))
}

impl<H: Handle> HandleValueMap<H> {
    /// Unbounded, empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounded, empty container.
    pub fn with_limits(max_count: usize, max_value_length: usize) -> Self {
        Self { entries: Vec::new(), limits: Some(ValueLimits { max_count, max_value_length }) }
    }

    /// Insert or replace the value for `handle`.
    ///
    /// # Errors
    ///
    /// `ValueCountExceeded` if a new entry would exceed the capacity,
    /// `ValueLengthExceeded` if the value is longer than allowed.
    pub fn add(&mut self, handle: H, value: impl Into<Bytes>) -> Result<(), RtiError> {
        let value = value.into();
        if let Some(limits) = self.limits
            && value.len() > limits.max_value_length
        {
            return Err(RtiError::new(
                ErrorKind::ValueLengthExceeded,
                format!("{handle}: {} > {} bytes", value.len(), limits.max_value_length),
            ));
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.handle == handle) {
            entry.value = value;
            return Ok(());
        }

        if let Some(limits) = self.limits
            && self.entries.len() >= limits.max_count
        {
            return Err(RtiError::new(
                ErrorKind::ValueCountExceeded,
                format!("capacity {}", limits.max_count),
            ));
        }

        self.entries.push(HandleValueEntry {
            handle,
            value,
            transportation: None,
            order: None,
            region: None,
        });
        Ok(())
    }

    /// Insert or replace with a copy of `value`.
    ///
    /// # Errors
    ///
    /// As [`HandleValueMap::add`].
    pub fn add_copied(&mut self, handle: H, value: &[u8]) -> Result<(), RtiError> {
        self.add(handle, Bytes::copy_from_slice(value))
    }

    /// Remove the entry for `handle`.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` if there is no such entry.
    pub fn remove(&mut self, handle: H) -> Result<Bytes, RtiError> {
        let index = self.position(handle).ok_or_else(|| {
            RtiError::new(ErrorKind::ArrayIndexOutOfBounds, format!("{handle} not present"))
        })?;
        Ok(self.entries.remove(index).value)
    }

    /// Value for `handle`.
    pub fn get(&self, handle: H) -> Option<&Bytes> {
        self.entries.iter().find(|e| e.handle == handle).map(|e| &e.value)
    }

    /// True if `handle` has an entry.
    pub fn contains(&self, handle: H) -> bool {
        self.position(handle).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capacity limits, if bounded.
    pub fn limits(&self) -> Option<ValueLimits> {
        self.limits
    }

    /// Handle at an ordinal position.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn handle_at(&self, index: usize) -> Result<H, RtiError> {
        self.entry_at(index).map(HandleValueEntry::handle)
    }

    /// Value at an ordinal position. Clone the `Bytes` to keep it.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn value_at(&self, index: usize) -> Result<&Bytes, RtiError> {
        self.entry_at(index).map(HandleValueEntry::value)
    }

    /// Length of the value at an ordinal position.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn value_length_at(&self, index: usize) -> Result<usize, RtiError> {
        self.entry_at(index).map(|e| e.value.len())
    }

    /// Entry at an ordinal position.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn entry_at(&self, index: usize) -> Result<&HandleValueEntry<H>, RtiError> {
        self.entries.get(index).ok_or_else(|| out_of_bounds(index, self.entries.len()))
    }

    /// Set the transportation type of the entry at `index`.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn set_transportation_at(
        &mut self,
        index: usize,
        transportation: TransportationType,
    ) -> Result<(), RtiError> {
        self.entry_mut(index)?.transportation = Some(transportation);
        Ok(())
    }

    /// Set the order type of the entry at `index`.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn set_order_at(&mut self, index: usize, order: OrderType) -> Result<(), RtiError> {
        self.entry_mut(index)?.order = Some(order);
        Ok(())
    }

    /// Set the region of the entry at `index`.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn set_region_at(&mut self, index: usize, region: RegionHandle) -> Result<(), RtiError> {
        self.entry_mut(index)?.region = Some(region);
        Ok(())
    }

    /// Iterate over `(handle, value)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &Bytes)> + '_ {
        self.entries.iter().map(|e| (e.handle, &e.value))
    }

    /// Handles of every entry.
    pub fn handles(&self) -> impl Iterator<Item = H> + '_ {
        self.entries.iter().map(|e| e.handle)
    }

    /// Keep only entries whose handle satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(H) -> bool) {
        self.entries.retain(|e| keep(e.handle));
    }

    /// Copy of `self` restricted to the handles satisfying `keep`.
    pub fn filtered(&self, keep: impl FnMut(H) -> bool) -> Self {
        let mut out = self.clone();
        out.retain(keep);
        out
    }

    fn position(&self, handle: H) -> Option<usize> {
        self.entries.iter().position(|e| e.handle == handle)
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut HandleValueEntry<H>, RtiError> {
        let len = self.entries.len();
        self.entries.get_mut(index).ok_or_else(|| out_of_bounds(index, len))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{decode, encode};

    fn p(raw: u32) -> ParameterHandle {
        ParameterHandle::from_raw(raw)
    }

    #[test]
    fn replacing_keeps_size_and_position() {
        let mut values = ParameterValues::new();
        values.add(p(1), b"one".to_vec()).unwrap();
        values.add(p(2), b"two".to_vec()).unwrap();
        values.add(p(1), Bytes::from_static(b"uno")).unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values.handle_at(0).unwrap(), p(1));
        assert_eq!(values.value_at(0).unwrap().as_ref(), b"uno");
        assert_eq!(values.value_length_at(1).unwrap(), 3);
    }

    #[test]
    fn owned_buffers_are_adopted() {
        let buffer = Bytes::from(vec![7u8; 64]);
        let ptr = buffer.as_ptr();
        let mut values = AttributeValues::new();
        values.add(AttributeHandle::from_raw(1), buffer).unwrap();
        assert_eq!(values.get(AttributeHandle::from_raw(1)).unwrap().as_ptr(), ptr);
    }

    #[test]
    fn ordinal_access_past_end_fails() {
        let mut values = ParameterValues::new();
        values.add_copied(p(1), b"x").unwrap();
        assert_eq!(values.handle_at(1).unwrap_err().kind, ErrorKind::ArrayIndexOutOfBounds);
        assert_eq!(values.value_at(5).unwrap_err().kind, ErrorKind::ArrayIndexOutOfBounds);
        assert_eq!(
            values.set_order_at(1, OrderType::Timestamp).unwrap_err().kind,
            ErrorKind::ArrayIndexOutOfBounds
        );
    }

    #[test]
    fn remove_absent_fails() {
        let mut values = ParameterValues::new();
        values.add_copied(p(1), b"x").unwrap();
        assert_eq!(values.remove(p(2)).unwrap_err().kind, ErrorKind::ArrayIndexOutOfBounds);
        assert_eq!(values.remove(p(1)).unwrap().as_ref(), b"x");
        assert!(values.is_empty());
    }

    #[test]
    fn bounded_container_limits() {
        let mut values = ParameterValues::with_limits(2, 4);
        values.add_copied(p(1), b"1234").unwrap();
        assert_eq!(
            values.add_copied(p(2), b"12345").unwrap_err().kind,
            ErrorKind::ValueLengthExceeded
        );
        values.add_copied(p(2), b"").unwrap();
        assert_eq!(values.add_copied(p(3), b"").unwrap_err().kind, ErrorKind::ValueCountExceeded);
        // Replacing an existing entry never counts against capacity.
        values.add_copied(p(2), b"ok").unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn per_entry_metadata() {
        let mut values = AttributeValues::new();
        values.add_copied(AttributeHandle::from_raw(4), b"v").unwrap();
        values.set_transportation_at(0, TransportationType::BestEffort).unwrap();
        values.set_region_at(0, RegionHandle::from_raw(2)).unwrap();
        let entry = values.entry_at(0).unwrap();
        assert_eq!(entry.transportation(), Some(TransportationType::BestEffort));
        assert_eq!(entry.region(), Some(RegionHandle::from_raw(2)));
        assert_eq!(entry.order(), None);
    }

    fn entry(raw: u32, value: &'static [u8]) -> HandleValueEntry<ParameterHandle> {
        HandleValueEntry {
            handle: p(raw),
            value: Bytes::from_static(value),
            transportation: None,
            order: None,
            region: None,
        }
    }

    #[test]
    fn decoding_rejects_duplicate_handles() {
        let forged = ParameterValues {
            entries: vec![entry(1, b"a"), entry(1, b"b")],
            limits: Some(ValueLimits { max_count: 1, max_value_length: 2 }),
        };
        let bytes = encode(&forged).unwrap();
        assert!(decode::<ParameterValues>(&bytes).is_err());
    }

    #[test]
    fn decoding_enforces_limits() {
        let too_long = ParameterValues {
            entries: vec![entry(1, b"abc")],
            limits: Some(ValueLimits { max_count: 1, max_value_length: 2 }),
        };
        assert!(decode::<ParameterValues>(&encode(&too_long).unwrap()).is_err());

        let too_many = ParameterValues {
            entries: vec![entry(1, b"a"), entry(2, b"b")],
            limits: Some(ValueLimits { max_count: 1, max_value_length: 2 }),
        };
        assert!(decode::<ParameterValues>(&encode(&too_many).unwrap()).is_err());
    }

    #[test]
    fn decoding_keeps_entry_metadata() {
        let mut values = ParameterValues::with_limits(2, 2);
        values.add_copied(p(3), b"ok").unwrap();
        values.set_order_at(0, OrderType::Timestamp).unwrap();
        let decoded: ParameterValues = decode(&encode(&values).unwrap()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(decoded.entry_at(0).unwrap().order(), Some(OrderType::Timestamp));
    }

    #[test]
    fn filtered_restricts_handles() {
        let mut values = AttributeValues::new();
        for raw in 1..=4 {
            values.add_copied(AttributeHandle::from_raw(raw), &[raw as u8]).unwrap();
        }
        let even = values.filtered(|h| h.raw() % 2 == 0);
        assert_eq!(even.handles().collect::<Vec<_>>(), vec![
            AttributeHandle::from_raw(2),
            AttributeHandle::from_raw(4)
        ]);
    }
}
