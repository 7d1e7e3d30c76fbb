pub mod f32;
pub mod io;
pub mod sample;

pub use self::f32::ImageF32;
pub use self::sample::BilinearTap;
