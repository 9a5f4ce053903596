//! Vector type alias for 3D positions and velocities.

use nalgebra::Vector3;

/// 3D vector type for positions, velocities, and directions.
///
/// Alias for `nalgebra::Vector3<f64>`. Transport statistics are accumulated
/// over many collisions, so the engine works in double precision throughout.
pub type Vec3 = Vector3<f64>;
