//! Logical time and logical time intervals.
//!
//! A federation runs on one logical time representation, chosen when the
//! federation execution is created. Two are provided: [`Float64Time`]
//! (`HLAfloat64Time`) and [`Integer64Time`] (`HLAinteger64Time`). Both are
//! totally ordered, never negative, and encode to exactly
//! [`ENCODED_LENGTH`] big-endian bytes.
//!
//! Arithmetic is checked: overflow or a negative result is
//! `IllegalTimeArithmetic`, never a silent wrap.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use zerocopy::{
    FromBytes, IntoBytes,
    byteorder::{BigEndian, F64, I64},
};

use crate::error::{ErrorKind, RtiError};

/// Encoded length of every time and interval representation.
pub const ENCODED_LENGTH: usize = 8;

/// A point on the federation's logical time axis.
pub trait LogicalTime:
    Copy
    + Ord
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Serialize
    + DeserializeOwned
{
    /// Matching interval type.
    type Interval: LogicalTimeInterval;

    /// Time implementation name reported by `listFederationExecutions`.
    const NAME: &'static str;

    /// The initial time (zero).
    fn initial() -> Self;

    /// The greatest representable time.
    fn final_time() -> Self;

    /// `self + interval`.
    ///
    /// # Errors
    ///
    /// `IllegalTimeArithmetic` on overflow.
    fn add(self, interval: Self::Interval) -> Result<Self, RtiError>;

    /// `self - interval`.
    ///
    /// # Errors
    ///
    /// `IllegalTimeArithmetic` if the result would be negative.
    fn subtract(self, interval: Self::Interval) -> Result<Self, RtiError>;

    /// Absolute distance between two times.
    fn distance(self, other: Self) -> Self::Interval;

    /// Canonical 8-byte encoding.
    fn encode(self) -> [u8; ENCODED_LENGTH];

    /// Decode the canonical encoding.
    ///
    /// # Errors
    ///
    /// `CouldNotDecode` on a wrong length, `InvalidLogicalTime` if the value
    /// is not a legal time.
    fn decode(bytes: &[u8]) -> Result<Self, RtiError>;

    /// True for [`LogicalTime::initial`].
    fn is_initial(self) -> bool {
        self == Self::initial()
    }

    /// True for [`LogicalTime::final_time`].
    fn is_final(self) -> bool {
        self == Self::final_time()
    }
}

/// A non-negative span of logical time.
pub trait LogicalTimeInterval:
    Copy
    + Ord
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Serialize
    + DeserializeOwned
{
    /// The zero interval.
    fn zero() -> Self;

    /// Smallest positive interval.
    fn epsilon() -> Self;

    /// Canonical 8-byte encoding.
    fn encode(self) -> [u8; ENCODED_LENGTH];

    /// Decode the canonical encoding.
    ///
    /// # Errors
    ///
    /// `CouldNotDecode` on a wrong length, `InvalidLogicalTimeInterval` if
    /// the value is negative or not a number.
    fn decode(bytes: &[u8]) -> Result<Self, RtiError>;

    /// True for [`LogicalTimeInterval::zero`].
    fn is_zero(self) -> bool {
        self == Self::zero()
    }
}

fn fixed_width(bytes: &[u8], what: &str) -> Result<[u8; ENCODED_LENGTH], RtiError> {
    bytes.try_into().map_err(|_| {
        RtiError::new(
            ErrorKind::CouldNotDecode,
            format!("{what} needs {ENCODED_LENGTH} bytes, got {}", bytes.len()),
        )
    })
}

fn illegal_arithmetic(op: &str, lhs: impl fmt::Display, rhs: impl fmt::Display) -> RtiError {
    RtiError::new(ErrorKind::IllegalTimeArithmetic, format!("{lhs} {op} {rhs}"))
}

fn encode_f64(value: f64) -> [u8; ENCODED_LENGTH] {
    let mut out = [0u8; ENCODED_LENGTH];
    out.copy_from_slice(F64::<BigEndian>::new(value).as_bytes());
    out
}

fn decode_f64(bytes: &[u8], what: &str) -> Result<f64, RtiError> {
    let raw = fixed_width(bytes, what)?;
    F64::<BigEndian>::read_from_bytes(&raw)
        .map(F64::get)
        .map_err(|_| RtiError::new(ErrorKind::CouldNotDecode, what.to_string()))
}

fn encode_i64(value: i64) -> [u8; ENCODED_LENGTH] {
    let mut out = [0u8; ENCODED_LENGTH];
    out.copy_from_slice(I64::<BigEndian>::new(value).as_bytes());
    out
}

fn decode_i64(bytes: &[u8], what: &str) -> Result<i64, RtiError> {
    let raw = fixed_width(bytes, what)?;
    I64::<BigEndian>::read_from_bytes(&raw)
        .map(I64::get)
        .map_err(|_| RtiError::new(ErrorKind::CouldNotDecode, what.to_string()))
}

/// `HLAfloat64Time`: non-negative, non-NaN `f64`. Positive infinity is the
/// final time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Float64Time(f64);

impl Float64Time {
    /// Create a time.
    ///
    /// # Errors
    ///
    /// `InvalidLogicalTime` for NaN or negative values.
    pub fn new(value: f64) -> Result<Self, RtiError> {
        if value.is_nan() || value < 0.0 {
            return Err(RtiError::new(ErrorKind::InvalidLogicalTime, format!("{value}")));
        }
        // Collapse -0.0 so equality and encoding agree.
        Ok(Self(value + 0.0))
    }

    /// Underlying value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Float64Time {
    type Error = RtiError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Float64Time> for f64 {
    fn from(time: Float64Time) -> Self {
        time.0
    }
}

impl PartialEq for Float64Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Float64Time {}

impl PartialOrd for Float64Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64Time {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Float64Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `HLAfloat64Interval`: non-negative, non-NaN `f64`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Float64Interval(f64);

impl Float64Interval {
    /// Create an interval.
    ///
    /// # Errors
    ///
    /// `InvalidLogicalTimeInterval` for NaN or negative values.
    pub fn new(value: f64) -> Result<Self, RtiError> {
        if value.is_nan() || value < 0.0 {
            return Err(RtiError::new(ErrorKind::InvalidLogicalTimeInterval, format!("{value}")));
        }
        Ok(Self(value + 0.0))
    }

    /// Underlying value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Float64Interval {
    type Error = RtiError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Float64Interval> for f64 {
    fn from(interval: Float64Interval) -> Self {
        interval.0
    }
}

impl PartialEq for Float64Interval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Float64Interval {}

impl PartialOrd for Float64Interval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64Interval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Float64Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LogicalTime for Float64Time {
    type Interval = Float64Interval;

    const NAME: &'static str = "HLAfloat64Time";

    fn initial() -> Self {
        Self(0.0)
    }

    fn final_time() -> Self {
        Self(f64::INFINITY)
    }

    fn add(self, interval: Float64Interval) -> Result<Self, RtiError> {
        let sum = self.0 + interval.0;
        if sum.is_nan() || (sum.is_infinite() && self.0.is_finite() && interval.0.is_finite()) {
            return Err(illegal_arithmetic("+", self, interval));
        }
        Ok(Self(sum))
    }

    fn subtract(self, interval: Float64Interval) -> Result<Self, RtiError> {
        let diff = self.0 - interval.0;
        if diff.is_nan() || diff < 0.0 {
            return Err(illegal_arithmetic("-", self, interval));
        }
        Ok(Self(diff + 0.0))
    }

    fn distance(self, other: Self) -> Float64Interval {
        let d = (self.0 - other.0).abs();
        // inf - inf is the only NaN source; equal times are zero apart.
        Float64Interval(if d.is_nan() { 0.0 } else { d })
    }

    fn encode(self) -> [u8; ENCODED_LENGTH] {
        encode_f64(self.0)
    }

    fn decode(bytes: &[u8]) -> Result<Self, RtiError> {
        Self::new(decode_f64(bytes, "HLAfloat64Time")?)
    }
}

impl LogicalTimeInterval for Float64Interval {
    fn zero() -> Self {
        Self(0.0)
    }

    fn epsilon() -> Self {
        Self(f64::EPSILON)
    }

    fn encode(self) -> [u8; ENCODED_LENGTH] {
        encode_f64(self.0)
    }

    fn decode(bytes: &[u8]) -> Result<Self, RtiError> {
        Self::new(decode_f64(bytes, "HLAfloat64Interval")?)
    }
}

/// `HLAinteger64Time`: non-negative `i64`. `i64::MAX` is the final time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Integer64Time(i64);

impl Integer64Time {
    /// Create a time.
    ///
    /// # Errors
    ///
    /// `InvalidLogicalTime` for negative values.
    pub fn new(value: i64) -> Result<Self, RtiError> {
        if value < 0 {
            return Err(RtiError::new(ErrorKind::InvalidLogicalTime, format!("{value}")));
        }
        Ok(Self(value))
    }

    /// Underlying value.
    pub fn value(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Integer64Time {
    type Error = RtiError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Integer64Time> for i64 {
    fn from(time: Integer64Time) -> Self {
        time.0
    }
}

impl fmt::Display for Integer64Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `HLAinteger64Interval`: non-negative `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Integer64Interval(i64);

impl Integer64Interval {
    /// Create an interval.
    ///
    /// # Errors
    ///
    /// `InvalidLogicalTimeInterval` for negative values.
    pub fn new(value: i64) -> Result<Self, RtiError> {
        if value < 0 {
            return Err(RtiError::new(ErrorKind::InvalidLogicalTimeInterval, format!("{value}")));
        }
        Ok(Self(value))
    }

    /// Underlying value.
    pub fn value(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Integer64Interval {
    type Error = RtiError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Integer64Interval> for i64 {
    fn from(interval: Integer64Interval) -> Self {
        interval.0
    }
}

impl fmt::Display for Integer64Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LogicalTime for Integer64Time {
    type Interval = Integer64Interval;

    const NAME: &'static str = "HLAinteger64Time";

    fn initial() -> Self {
        Self(0)
    }

    fn final_time() -> Self {
        Self(i64::MAX)
    }

    fn add(self, interval: Integer64Interval) -> Result<Self, RtiError> {
        self.0
            .checked_add(interval.0)
            .map(Self)
            .ok_or_else(|| illegal_arithmetic("+", self, interval))
    }

    fn subtract(self, interval: Integer64Interval) -> Result<Self, RtiError> {
        match self.0.checked_sub(interval.0) {
            Some(v) if v >= 0 => Ok(Self(v)),
            _ => Err(illegal_arithmetic("-", self, interval)),
        }
    }

    fn distance(self, other: Self) -> Integer64Interval {
        // Both operands are non-negative, so the difference cannot overflow.
        Integer64Interval((self.0 - other.0).abs())
    }

    fn encode(self) -> [u8; ENCODED_LENGTH] {
        encode_i64(self.0)
    }

    fn decode(bytes: &[u8]) -> Result<Self, RtiError> {
        Self::new(decode_i64(bytes, "HLAinteger64Time")?)
    }
}

impl LogicalTimeInterval for Integer64Interval {
    fn zero() -> Self {
        Self(0)
    }

    fn epsilon() -> Self {
        Self(1)
    }

    fn encode(self) -> [u8; ENCODED_LENGTH] {
        encode_i64(self.0)
    }

    fn decode(bytes: &[u8]) -> Result<Self, RtiError> {
        Self::new(decode_i64(bytes, "HLAinteger64Interval")?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    fn ft(v: f64) -> Float64Time {
        Float64Time::new(v).unwrap()
    }

    fn fi(v: f64) -> Float64Interval {
        Float64Interval::new(v).unwrap()
    }

    #[test]
    fn float_encoding_is_ieee754_big_endian() {
        assert_eq!(ft(1.0).encode(), hex!("3ff0000000000000"));
        assert_eq!(Float64Time::decode(&hex!("4024000000000000")).unwrap(), ft(10.0));
    }

    #[test]
    fn integer_encoding_is_twos_complement_big_endian() {
        assert_eq!(Integer64Time::new(258).unwrap().encode(), hex!("0000000000000102"));
        assert_eq!(
            Integer64Interval::decode(&hex!("0000000000000005")).unwrap(),
            Integer64Interval::new(5).unwrap()
        );
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert_eq!(Float64Time::decode(&[0; 7]).unwrap_err().kind, ErrorKind::CouldNotDecode);
        assert_eq!(
            Float64Time::decode(&(-1.0f64).to_be_bytes()).unwrap_err().kind,
            ErrorKind::InvalidLogicalTime
        );
        assert_eq!(
            Integer64Interval::decode(&(-3i64).to_be_bytes()).unwrap_err().kind,
            ErrorKind::InvalidLogicalTimeInterval
        );
    }

    #[test]
    fn nan_and_negative_are_rejected() {
        assert!(Float64Time::new(f64::NAN).is_err());
        assert!(Float64Time::new(-0.5).is_err());
        assert!(Float64Interval::new(f64::NAN).is_err());
        assert!(Integer64Time::new(-1).is_err());
    }

    #[test]
    fn initial_and_final() {
        assert!(Float64Time::initial().is_initial());
        assert!(Float64Time::final_time().is_final());
        assert!(Float64Time::initial() < Float64Time::final_time());
        assert_eq!(Integer64Time::final_time().value(), i64::MAX);
        assert!(Float64Interval::epsilon() > Float64Interval::zero());
        assert!(Integer64Interval::zero().is_zero());
    }

    #[test]
    fn checked_arithmetic() {
        assert_eq!(ft(1.5).add(fi(2.0)).unwrap(), ft(3.5));
        assert_eq!(ft(3.5).subtract(fi(1.5)).unwrap(), ft(2.0));
        assert_eq!(ft(1.0).subtract(fi(2.0)).unwrap_err().kind, ErrorKind::IllegalTimeArithmetic);
        assert_eq!(
            ft(f64::MAX).add(fi(f64::MAX)).unwrap_err().kind,
            ErrorKind::IllegalTimeArithmetic
        );
        assert_eq!(Float64Time::final_time().add(fi(1.0)).unwrap(), Float64Time::final_time());

        let max = Integer64Time::final_time();
        let one = Integer64Interval::new(1).unwrap();
        assert_eq!(max.add(one).unwrap_err().kind, ErrorKind::IllegalTimeArithmetic);
        assert_eq!(
            Integer64Time::initial().subtract(one).unwrap_err().kind,
            ErrorKind::IllegalTimeArithmetic
        );
    }

    #[test]
    fn distance_is_symmetric() {
        assert_eq!(ft(1.0).distance(ft(4.0)), fi(3.0));
        assert_eq!(ft(4.0).distance(ft(1.0)), fi(3.0));
        assert_eq!(Float64Time::final_time().distance(Float64Time::final_time()), fi(0.0));
    }

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(ft(-0.0), Float64Time::initial());
        assert_eq!(ft(-0.0).encode(), Float64Time::initial().encode());
    }

    proptest! {
        #[test]
        fn float_time_round_trips(v in 0.0f64..=f64::MAX) {
            let t = ft(v);
            prop_assert_eq!(Float64Time::decode(&t.encode()).unwrap(), t);
        }

        #[test]
        fn float_interval_round_trips(v in 0.0f64..1.0e12) {
            let i = fi(v);
            prop_assert_eq!(Float64Interval::decode(&i.encode()).unwrap(), i);
        }

        #[test]
        fn integer_time_round_trips(v in 0i64..=i64::MAX) {
            let t = Integer64Time::new(v).unwrap();
            prop_assert_eq!(Integer64Time::decode(&t.encode()).unwrap(), t);
        }

        #[test]
        fn integer_interval_round_trips(v in 0i64..=i64::MAX) {
            let i = Integer64Interval::new(v).unwrap();
            prop_assert_eq!(Integer64Interval::decode(&i.encode()).unwrap(), i);
        }

        #[test]
        fn encoding_preserves_order(a in 0.0f64..1.0e9, b in 0.0f64..1.0e9) {
            // Big-endian IEEE-754 of non-negative values sorts like the values.
            prop_assert_eq!(ft(a).encode().cmp(&ft(b).encode()), ft(a).cmp(&ft(b)));
        }
    }
}
