use num::{Float, FromPrimitive};
use rand::distributions::uniform::SampleUniform;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

pub mod isolation_forest;
pub mod isolation_tree;

pub use isolation_forest::{Contamination, IsolationForest, MaxSamples};
pub use isolation_tree::IsolationTree;

/// Float types the isolation forest can be fitted over (`f32` and `f64`).
pub trait FType:
    Float
    + FromPrimitive
    + SampleUniform
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + std::fmt::Debug
    + Send
    + Sync
{
}
impl<T> FType for T where
    T: Float
        + FromPrimitive
        + SampleUniform
        + AddAssign
        + SubAssign
        + MulAssign
        + DivAssign
        + std::fmt::Debug
        + Send
        + Sync
{
}

/// Lossless for the primitive float types this crate is used with.
#[inline]
pub(crate) fn float<F: FType>(value: f64) -> F {
    F::from_f64(value).unwrap_or_else(F::nan)
}
