// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Debug, Display, Formatter};
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Div, Mul, Sub};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A time span tagged with its unit.
///
/// The unit is a zero-sized marker type, so a `Duration<Milliseconds>` is
/// exactly one `f64` wide but cannot be confused with a `Duration<Seconds>`
/// without an explicit conversion.
///
/// # Examples
/// ```rust
/// use percept_units::duration::milliseconds;
///
/// let hold = milliseconds(750.0);
/// assert!(hold >= milliseconds(500.0));
/// ```
#[derive(Clone, Copy, Default)]
pub struct Duration<U> {
    value: f64,
    unit: PhantomData<U>,
}

impl<U> Duration<U> {
    pub const fn new(value: f64) -> Self {
        Duration {
            value,
            unit: PhantomData,
        }
    }

    pub const ZERO: Self = Self::new(0.0);

    pub fn value(self) -> f64 {
        self.value
    }

    pub fn is_zero(self) -> bool {
        self.value == 0.0
    }

    /// Difference clamped at zero. Holds are measured against a monotonic
    /// timer, so a negative difference only ever comes from caller mixups.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self::new((self.value - rhs.value).max(0.0))
    }
}

impl<U> PartialEq for Duration<U> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

// Durations come from experiment configuration and timer readings, never NaN.
impl<U> Eq for Duration<U> {}

impl<U> PartialOrd for Duration<U> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<U> Ord for Duration<U> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.total_cmp(&other.value)
    }
}

impl<U> Debug for Duration<U> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Duration")
            .field("value", &self.value)
            .field("unit", &std::any::type_name::<U>())
            .finish()
    }
}

impl<U> Add for Duration<U> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.value + rhs.value)
    }
}

impl<U> AddAssign for Duration<U> {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
    }
}

impl<U> Sub for Duration<U> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.value - rhs.value)
    }
}

impl<U> Mul<f64> for Duration<U> {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.value * rhs)
    }
}

impl<U> Div<f64> for Duration<U> {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.value / rhs)
    }
}

impl<U: Display + Default> Display for Duration<U> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, U::default())
    }
}

impl<U> Serialize for Duration<U> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value)
    }
}

impl<'de, U> Deserialize<'de> for Duration<U> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::new)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Milliseconds;

impl Display for Milliseconds {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ms")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Seconds;

impl Display for Seconds {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "s")
    }
}

pub const fn milliseconds(value: f64) -> Duration<Milliseconds> {
    Duration::new(value)
}

pub const fn seconds(value: f64) -> Duration<Seconds> {
    Duration::new(value)
}

impl Duration<Milliseconds> {
    pub fn to_seconds(self) -> Duration<Seconds> {
        Duration::new(self.value / 1e3)
    }
}

impl Duration<Seconds> {
    pub fn to_milliseconds(self) -> Duration<Milliseconds> {
        Duration::new(self.value * 1e3)
    }
}
