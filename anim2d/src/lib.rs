//! Pure Rust runtime core for 2D skeletal animation (Spine 3.8 rig
//! semantics).
//!
//! This crate is renderer-agnostic and holds no global state. The
//! immutable [`SkeletonData`] (built through [`SkeletonBuilder`]) is
//! shared across any number of [`SkeletonInstance`]s. Each frame a
//! caller:
//!
//! 1. calls [`ClipInstance::evaluate`] (and
//!    [`ClipInstance::evaluate_range`] for events) on every active clip,
//! 2. commits with [`SkeletonInstance::apply_cache`],
//! 3. resolves the palette with
//!    [`SkeletonInstance::pose_skinning_palette`].
//!
//! Content loading, atlas management and the animation network that
//! picks clips and weights are external collaborators.

#![forbid(unsafe_code)]

mod builder;
mod error;
mod math;
mod model;
mod runtime;

#[cfg(feature = "json")]
pub mod json;

pub use builder::*;
pub use error::*;
pub use math::*;
pub use model::*;
pub use runtime::*;


#[cfg(test)]
mod builder_tests;
