//! Statistical and behavioural validation of the transport engine
//!
//! These tests check the sampled distributions against their closed forms
//! and the end-to-end run against the exponential free-path law
//! (mean = standard deviation = mean free path).

use ctor::ctor;
use neutron_sim_core::analysis::{
    ks_critical_value, ks_statistic, ExponentialValidation, SampleStats,
};
use neutron_sim_core::physics::{IntegratorSettings, KinematicState, MotionIntegrator, ZeroField};
use neutron_sim_core::sampling::{sample_cosine_angle, sample_exponential};
use neutron_sim_core::{
    run_simulation, CollisionFate, ExecutionMode, FieldConfig, Neutron, ScatterFrame,
    SimulationConfig, Termination, TransportEngine, TransportError, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_exponential_samples_match_mean_free_path() {
    let mut rng = StdRng::seed_from_u64(2024);
    for lambda in [0.05, 1.0, 12.0] {
        let samples = sample_exponential(lambda, 100_000, &mut rng).unwrap();
        assert!(samples.iter().all(|&s| s >= 0.0));
        let stats = SampleStats::from_samples(&samples).unwrap();
        assert!(
            (stats.mean - lambda).abs() / lambda < 0.05,
            "λ = {lambda}: mean {}",
            stats.mean
        );
    }
}

#[test]
fn test_cosine_angles_pass_ks_test() {
    let mut rng = StdRng::seed_from_u64(99);
    let n = 20_000;
    let angles = sample_cosine_angle(n, &mut rng).unwrap();
    assert!(angles
        .iter()
        .all(|&t| (0.0..=std::f64::consts::FRAC_PI_2).contains(&t)));

    // CDF of the cos θ density on [0, π/2] is sin θ
    let d = ks_statistic(&angles, f64::sin);
    let critical = ks_critical_value(n, 0.001);
    assert!(d < critical, "KS statistic {d} exceeds critical value {critical}");
}

#[test]
fn test_repeated_scatter_preserves_speed() {
    let mut rng = StdRng::seed_from_u64(5);
    for frame in [ScatterFrame::Laboratory, ScatterFrame::Incident] {
        let mut neutron = Neutron::isotropic(4.2, &mut rng).unwrap();
        for _ in 0..10_000 {
            let before = neutron.speed();
            neutron.scatter_in_frame(frame, &mut rng).unwrap();
            assert!((neutron.speed() - before).abs() / before < 1e-9);
        }
    }
}

#[test]
fn test_zero_field_advance_is_straight_line() {
    let integrator = MotionIntegrator::default();
    let mut rng = StdRng::seed_from_u64(31);
    for i in 0..=10 {
        let t = f64::from(i) / 10.0;
        let mut neutron = Neutron::isotropic(1.7, &mut rng).unwrap();
        let (x0, v0) = (neutron.position(), neutron.velocity());
        neutron.advance((0.0, t), &ZeroField, &integrator).unwrap();
        assert!((neutron.position() - (x0 + v0 * t)).norm() < 1e-6);

        // The Runge-Kutta path agrees as well
        let end = integrator
            .integrate(KinematicState::new(x0, v0), (0.0, t), &ZeroField)
            .unwrap();
        assert!((end.position - (x0 + v0 * t)).norm() < 1e-6);
    }
}

#[test]
fn test_no_absorption_caps_every_particle() {
    let max_collisions = 40;
    let config = SimulationConfig::default()
        .with_num_neutrons(200)
        .with_probabilities(0.6, 0.0)
        .with_max_collisions(max_collisions)
        .with_seed(3);
    let result = run_simulation(config).unwrap();
    assert_eq!(result.collision_counts.len(), 200);
    assert!(result.collision_counts.iter().all(|&c| c == max_collisions));
    assert_eq!(result.capped_particles, 200);
    assert_eq!(result.path_lengths.len(), 200 * max_collisions as usize);
}

#[test]
fn test_fate_partition_is_half_open() {
    let (s, a) = (0.375, 0.5);
    assert_eq!(CollisionFate::resolve(s, s, a), CollisionFate::Absorb);
    assert_eq!(CollisionFate::resolve(s + a, s, a), CollisionFate::RemainderScatter);
    assert_eq!(CollisionFate::resolve(0.0, s, a), CollisionFate::Scatter);
    // No absorb band at all
    assert_eq!(CollisionFate::resolve(0.4, 0.4, 0.0), CollisionFate::RemainderScatter);
}

#[test]
fn test_reference_scenario_matches_exponential_law() {
    let config = SimulationConfig::default()
        .with_num_neutrons(1000)
        .with_mean_free_path(1.0)
        .with_probabilities(0.7, 0.3)
        .with_seed(12345);
    let result = run_simulation(config).unwrap();

    assert_eq!(result.total_distances.len(), 1000);
    assert_eq!(result.capped_particles, 0);
    assert_eq!(result.path_lengths.len() as u64, result.total_collisions());

    let check = ExponentialValidation::evaluate(&result.path_lengths, 1.0, 10.0).unwrap();
    assert!(check.passed, "mean error {}%", check.mean_error_percent);
    assert!(check.std_error_percent < 10.0, "std error {}%", check.std_error_percent);

    // Geometric number of collisions with success probability 0.3
    let mean_collisions = result.mean_collisions().unwrap();
    assert!((mean_collisions - 1.0 / 0.3).abs() < 0.3, "{mean_collisions}");
}

#[test]
fn test_seeded_runs_identical_across_parallelism() {
    let base = SimulationConfig::default()
        .with_num_neutrons(300)
        .with_seed(0xDEAD_BEEF);

    let sequential = run_simulation(base.clone().with_execution(ExecutionMode::Sequential)).unwrap();
    let global = run_simulation(base.clone().with_execution(ExecutionMode::Parallel)).unwrap();
    let four = run_simulation(base.with_execution(ExecutionMode::Threads(4))).unwrap();

    assert_eq!(sequential, global);
    assert_eq!(sequential, four);
}

#[test]
fn test_forced_field_runs_and_stays_finite() {
    let config = SimulationConfig::default()
        .with_num_neutrons(50)
        .with_probabilities(0.5, 0.5)
        .with_max_collisions(6)
        .with_field(FieldConfig::LinearDrag { coefficient: 0.05 })
        .with_scatter_frame(ScatterFrame::Incident)
        .with_seed(77);
    let result = run_simulation(config).unwrap();
    assert!(result.path_lengths.iter().all(|d| d.is_finite() && *d >= 0.0));
    // Drag slows the neutron, so it covers less than the nominal free path
    let realised: f64 = result.path_lengths.iter().sum();
    let nominal: f64 = result.sampled_path_lengths.iter().sum();
    assert!(realised < nominal);
}

#[test]
fn test_strong_drag_run_completes() {
    // Drag collapses the speed within a few collisions, so later flight times
    // `distance / speed` become far too long to integrate
    let config = SimulationConfig::default()
        .with_num_neutrons(200)
        .with_field(FieldConfig::LinearDrag { coefficient: 0.5 })
        .with_seed(1)
        .with_execution(ExecutionMode::Sequential);
    let result = run_simulation(config).unwrap();

    assert_eq!(result.num_particles(), 200);
    assert_eq!(result.path_lengths.len() as u64, result.total_collisions());
    assert!(result.path_lengths.iter().all(|d| d.is_finite() && *d >= 0.0));
    assert!(result.capped_particles + result.stalled_particles <= 200);
}

#[test]
fn test_stalled_particles_are_counted_not_fatal() {
    let settings = IntegratorSettings {
        max_steps: 10,
        ..IntegratorSettings::default()
    };
    let base = SimulationConfig::default()
        .with_num_neutrons(50)
        .with_field(FieldConfig::LinearDrag { coefficient: 0.1 })
        .with_integrator(settings)
        .with_seed(8);

    let sequential = run_simulation(base.clone().with_execution(ExecutionMode::Sequential)).unwrap();
    assert_eq!(sequential.num_particles(), 50);
    assert!(sequential.stalled_particles > 0);
    assert_eq!(
        sequential.path_lengths.len() as u64,
        sequential.total_collisions()
    );

    let threaded = run_simulation(base.with_execution(ExecutionMode::Threads(3))).unwrap();
    assert_eq!(sequential, threaded);
}

#[test]
fn test_fatal_trajectory_error_aborts_run() {
    // Velocity overflows once a first flight lasts longer than one time unit
    let base = SimulationConfig::default()
        .with_num_neutrons(50)
        .with_field(FieldConfig::Uniform {
            acceleration: [f64::MAX; 3],
        })
        .with_seed(3);
    assert!(base.validate().is_ok());

    for execution in [ExecutionMode::Sequential, ExecutionMode::Threads(4)] {
        let outcome = run_simulation(base.clone().with_execution(execution));
        assert!(
            matches!(outcome, Err(TransportError::NonFiniteState(_))),
            "{execution:?} gave {outcome:?}"
        );
    }
}

#[test]
fn test_engine_handles_stationary_neutron() {
    let config = SimulationConfig::default().with_probabilities(1.0, 0.0).with_max_collisions(8);
    let field = config.field.build();
    let engine = TransportEngine::new(
        config.transport_params(),
        field.as_ref(),
        MotionIntegrator::default(),
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let mut neutron = Neutron::new(Vec3::new(1.0, 1.0, 1.0), Vec3::zeros()).unwrap();
    let record = engine.transport(&mut neutron, &mut rng).unwrap();
    assert_eq!(record.summary.collisions, 8);
    assert_eq!(record.summary.termination, Termination::CapExceeded);
    assert_eq!(neutron.position(), Vec3::new(1.0, 1.0, 1.0));
}
