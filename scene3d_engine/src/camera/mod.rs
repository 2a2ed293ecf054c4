/// Scene camera

pub mod camera;

pub use camera::Camera;
