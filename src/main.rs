use rgbd_odometry::config::odometry;
use rgbd_odometry::image::io::{load_rgbd_frame, write_json_file};
use rgbd_odometry::{compute_rgbd_odometry_with_diagnostics, se3};
use std::env;
use std::path::Path;

fn usage() -> String {
    "Usage: rgbd_odometry <config.json>".to_string()
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = odometry::load_config(Path::new(&config_path))?;

    let source = load_rgbd_frame(
        &config.source.color,
        &config.source.depth,
        config.depth.scale,
        config.depth.trunc,
    )?;
    let target = load_rgbd_frame(
        &config.target.color,
        &config.target.depth,
        config.depth.scale,
        config.depth.trunc,
    )?;

    let report = compute_rgbd_odometry_with_diagnostics(
        &source,
        &target,
        &config.intrinsics,
        &config.initial_matrix(),
        &config.odometry,
    )
    .map_err(|e| e.to_string())?;

    println!("{}", report.summary());
    if report.result.success {
        let pose = se3::isometry_from_matrix(&report.result.transform).map_err(|e| e.to_string())?;
        let (angle, translation) = se3::pose_error(&nalgebra::Isometry3::identity(), &pose);
        println!(
            "motion: rotation={:.4} deg translation={:.4} m",
            angle.to_degrees(),
            translation
        );
        let twist = se3::log(&pose);
        println!(
            "twist (w, v): [{:.5}, {:.5}, {:.5}, {:.5}, {:.5}, {:.5}]",
            twist[0], twist[1], twist[2], twist[3], twist[4], twist[5]
        );
        println!("transform:{}", report.result.transform);
        println!("information:{}", report.result.information);
    }

    if let Some(path) = &config.output.report_json {
        write_json_file(path, &report)?;
        println!("report written to {}", path.display());
    }
    Ok(())
}
