use clap::Parser;
use nalgebra::DVector;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{info, warn};

use symopt::factors::{FactorResult, JacobianFactor};
use symopt::{
    DEFAULT_EPSILON, Factor, Key, LieGroupOps, OptimizationStatus, Optimizer, OptimizerParams,
    Pose2, Values, init_logger,
};

#[derive(Parser)]
#[command(name = "optimize_pose_chain")]
#[command(about = "Optimize a noisy 2D odometry chain anchored by a prior on the first pose")]
struct Args {
    /// Number of poses in the chain
    #[arg(short, long, default_value = "20")]
    poses: usize,

    /// Maximum number of optimization iterations
    #[arg(short, long, default_value = "50")]
    max_iterations: usize,

    /// Magnitude of the uniform noise added to the initial guess
    #[arg(short, long, default_value = "0.1")]
    noise: f64,

    /// Seed for the noise generator
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Log the final summary and per-iteration table
    #[arg(short, long)]
    verbose: bool,
}

fn pose_key(i: usize) -> Key {
    Key::with_sub('x', i as i64)
}

/// Residual of `measured` against the relative transform between two poses.
fn odometry_factor(from: Key, to: Key, measured: Pose2) -> FactorResult<JacobianFactor> {
    JacobianFactor::from_residual(
        vec![from, to],
        move |values, index| {
            let a: Pose2 = values.at_entry(&index.entries[0])?;
            let b: Pose2 = values.at_entry(&index.entries[1])?;
            Ok(DVector::from_vec(
                measured.local_coordinates(&a.between(&b), DEFAULT_EPSILON),
            ))
        },
        DEFAULT_EPSILON,
    )
}

fn prior_factor(key: Key, prior: Pose2) -> FactorResult<JacobianFactor> {
    JacobianFactor::from_residual(
        vec![key],
        move |values, index| {
            let pose: Pose2 = values.at_entry(&index.entries[0])?;
            Ok(DVector::from_vec(prior.local_coordinates(&pose, DEFAULT_EPSILON)))
        },
        DEFAULT_EPSILON,
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let args = Args::parse();
    if args.poses < 2 {
        return Err("A chain needs at least two poses".into());
    }

    let step = Pose2::from_xy_angle(1.0, 0.0, 0.1);
    let mut rng = StdRng::seed_from_u64(args.seed);

    let mut truth = vec![Pose2::identity()];
    for i in 1..args.poses {
        truth.push(truth[i - 1] * step);
    }

    let mut factors: Vec<Box<dyn Factor>> = vec![Box::new(prior_factor(pose_key(0), truth[0])?)];
    for i in 1..args.poses {
        factors.push(Box::new(odometry_factor(pose_key(i - 1), pose_key(i), step)?));
    }

    let mut values = Values::new();
    for (i, pose) in truth.iter().enumerate() {
        let mut jitter = || rng.random_range(-1.0..1.0) * args.noise;
        let noisy = Pose2::from_xy_angle(
            pose.x() + jitter(),
            pose.y() + jitter(),
            pose.angle() + jitter(),
        );
        values.set(pose_key(i), noisy);
    }

    info!(
        "Optimizing {} poses with {} factors (noise {:.3}, seed {})",
        args.poses,
        factors.len(),
        args.noise,
        args.seed
    );

    let params = OptimizerParams::new()
        .with_max_iterations(args.max_iterations)
        .with_verbose(args.verbose);
    let mut optimizer = Optimizer::new(params, factors)?.with_name("pose_chain");
    let stats = optimizer.optimize_with(&mut values, None, true)?;

    match &stats.status {
        OptimizationStatus::Converged => info!("Converged after {} iterations", stats.num_iterations()),
        status => warn!("Stopped after {} iterations: {}", stats.num_iterations(), status),
    }
    info!(
        "Error: {:.6e} -> {:.6e} in {:.2}ms",
        stats.initial_error,
        stats.final_error,
        stats.elapsed.as_secs_f64() * 1000.0
    );

    let last = pose_key(args.poses - 1);
    let estimate: Pose2 = values.at(&last)?;
    let expected = truth[args.poses - 1];
    info!(
        "Last pose {}: estimate {} (truth {}), error {:.3e}",
        last,
        estimate,
        expected,
        (estimate.position() - expected.position()).norm()
    );

    if let Some(linearization) = &stats.best_linearization {
        let covariances = optimizer.compute_covariances(linearization, &[last])?;
        if let Some(cov) = covariances.get(&last) {
            info!("Covariance of {}: {:?}", last, cov);
        }
    }

    Ok(())
}
