mod point;
mod vec;

pub use point::Point3;
pub use vec::Vec3;
