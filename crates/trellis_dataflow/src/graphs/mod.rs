// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node libraries built on the core framework.

pub mod geometry;
pub mod math;

pub use geometry::create_geometry_registry;
pub use math::create_math_registry;
