use nalgebra::{Isometry3, Point3, Vector3, Vector6};
use rgbd_odometry::image::ImageF32;
use rgbd_odometry::{se3, PinholeIntrinsics, RgbdFrame};

/// Axis-aligned planes `p[axis] = offset` bounding the room, in world
/// coordinates (camera convention: x right, y down, z forward).
const WALLS: [(usize, f64); 5] = [
    (0, -1.2), // left
    (0, 1.5),  // right
    (1, -1.0), // ceiling
    (1, 0.9),  // floor
    (2, 2.5),  // back wall
];

pub const WIDTH: usize = 160;
pub const HEIGHT: usize = 120;

/// Intrinsics of the synthetic camera.
pub fn intrinsics() -> PinholeIntrinsics {
    PinholeIntrinsics::new(WIDTH, HEIGHT, 130.0, 130.0, 79.5, 59.5)
}

/// Smooth texture painted on every wall; varies along every pair of axes.
fn albedo(p: &Point3<f64>) -> f64 {
    use std::f64::consts::TAU;
    let a = (TAU * p.x / 0.31 + 0.7).sin() * (TAU * p.y / 0.27).cos();
    let b = (TAU * p.z / 0.37 + 0.4 * p.x).sin() * (TAU * p.y / 0.33 + 0.3 * p.z).cos();
    let c = (TAU * (p.x + p.y + p.z) / 0.45).sin();
    0.5 + 0.18 * a + 0.18 * b + 0.08 * c
}

/// Render the room from a camera whose pose in world coordinates is
/// `camera_to_world`.
pub fn render(camera_to_world: &Isometry3<f64>) -> RgbdFrame {
    let k = intrinsics();
    let rotation = camera_to_world.rotation.to_rotation_matrix();
    let origin = camera_to_world.translation.vector;
    let mut intensity = ImageF32::new(WIDTH, HEIGHT);
    let mut depth = ImageF32::new(WIDTH, HEIGHT);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let ray_cam = Vector3::new(
                (x as f64 - k.cx) / k.fx,
                (y as f64 - k.cy) / k.fy,
                1.0,
            );
            let ray = rotation * ray_cam;
            let t = WALLS
                .iter()
                .filter_map(|&(axis, offset)| {
                    let t = (offset - origin[axis]) / ray[axis];
                    (ray[axis].abs() > 1e-12 && t > 0.0).then_some(t)
                })
                .fold(f64::INFINITY, f64::min);
            let hit = Point3::from(origin + ray * t);
            // camera z along the ray equals t since ray_cam.z == 1
            depth.set(x, y, t as f32);
            intensity.set(x, y, albedo(&hit) as f32);
        }
    }
    RgbdFrame::new(intensity, depth).expect("synthetic frame is consistent")
}

/// Small motion used by the recovery tests: about 2.7 cm and 0.8°.
pub fn small_motion() -> Isometry3<f64> {
    let axis = Vector3::new(0.3, 1.0, 0.2).normalize() * 0.8f64.to_radians();
    se3::exp(&Vector6::new(axis.x, axis.y, axis.z, 0.02, -0.015, 0.01))
}

/// Source frame at the world origin and target frame at `motion`; the
/// transform mapping target points into the source frame is `motion`.
pub fn frame_pair(motion: &Isometry3<f64>) -> (RgbdFrame, RgbdFrame) {
    (render(&Isometry3::identity()), render(motion))
}
