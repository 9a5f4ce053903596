use clap::{Parser, ValueEnum};
use neutron_sim_core::analysis::{ExponentialValidation, Histogram, DEFAULT_TOLERANCE_PERCENT};
use neutron_sim_core::{
    run_simulation, ExecutionMode, FieldConfig, ScatterFrame, SimulationConfig, SimulationResult,
};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Width of the longest histogram bar in characters
const BAR_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FieldKind {
    /// Straight-line flight between collisions
    Zero,
    /// Constant acceleration given by --accel
    Uniform,
    /// Velocity-proportional drag given by --drag
    Drag,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Frame {
    Lab,
    Incident,
}

/// Monte Carlo neutron transport demo
#[derive(Parser, Debug)]
#[command(name = "neutron-sim-demo")]
#[command(about = "Monte Carlo neutron transport through a homogeneous medium", long_about = None)]
struct Args {
    /// Number of neutrons to transport
    #[arg(short, long, default_value_t = 1000)]
    neutrons: usize,

    /// Probability that a collision scatters
    #[arg(short, long, default_value_t = 0.7)]
    scatter_prob: f64,

    /// Probability that a collision absorbs
    #[arg(short, long, default_value_t = 0.3)]
    absorb_prob: f64,

    /// Mean free path between collisions
    #[arg(short = 'l', long, default_value_t = 1.0)]
    mean_free_path: f64,

    /// Initial neutron speed
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Collision cap per neutron
    #[arg(long, default_value_t = 10_000)]
    max_collisions: u32,

    /// RNG seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Acceleration field acting during free flight
    #[arg(long, value_enum, default_value = "zero")]
    field: FieldKind,

    /// Uniform field acceleration vector
    #[arg(long, num_args = 3, value_names = ["AX", "AY", "AZ"], default_values_t = [0.0, 0.0, -1.0])]
    accel: Vec<f64>,

    /// Linear drag coefficient
    #[arg(long, default_value_t = 0.02)]
    drag: f64,

    /// Frame in which scattering angles are sampled
    #[arg(long, value_enum, default_value = "lab")]
    frame: Frame,

    /// Worker threads (0 = rayon default)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Run on the calling thread only
    #[arg(long)]
    sequential: bool,

    /// Stop starting neutrons after this many collisions
    #[arg(long)]
    collision_budget: Option<u64>,

    /// Histogram bin count
    #[arg(short, long, default_value_t = 50)]
    bins: usize,

    /// Validation tolerance in percent
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_PERCENT)]
    tolerance: f64,
}

impl Args {
    fn to_config(&self) -> SimulationConfig {
        let field = match self.field {
            FieldKind::Zero => FieldConfig::Zero,
            FieldKind::Uniform => {
                let mut acceleration = [0.0; 3];
                for (slot, value) in acceleration.iter_mut().zip(&self.accel) {
                    *slot = *value;
                }
                FieldConfig::Uniform { acceleration }
            }
            FieldKind::Drag => FieldConfig::LinearDrag {
                coefficient: self.drag,
            },
        };
        let frame = match self.frame {
            Frame::Lab => ScatterFrame::Laboratory,
            Frame::Incident => ScatterFrame::Incident,
        };
        let execution = if self.sequential {
            ExecutionMode::Sequential
        } else if self.threads > 0 {
            ExecutionMode::Threads(self.threads)
        } else {
            ExecutionMode::Parallel
        };

        let mut config = SimulationConfig::default()
            .with_num_neutrons(self.neutrons)
            .with_probabilities(self.scatter_prob, self.absorb_prob)
            .with_mean_free_path(self.mean_free_path)
            .with_initial_speed(self.speed)
            .with_max_collisions(self.max_collisions)
            .with_field(field)
            .with_scatter_frame(frame)
            .with_execution(execution);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(budget) = self.collision_budget {
            config = config.with_collision_budget(budget);
        }
        config
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.to_config();

    println!("=== Neutron Transport Demo ===\n");
    println!(
        "Neutrons: {}, scatter: {:.3}, absorb: {:.3}, mean free path: {:.3}",
        config.num_neutrons, config.scatter_prob, config.absorb_prob, config.mean_free_path
    );
    println!("Field: {:?}, frame: {:?}\n", config.field, config.scatter_frame);
    println!("Running simulation...");

    let result = match run_simulation(config) {
        Ok(result) => result,
        Err(e) => {
            error!("simulation failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    print_summary(&result);

    if result.path_lengths.is_empty() {
        println!("\nNo collisions recorded; nothing to validate.");
        return ExitCode::SUCCESS;
    }

    match ExponentialValidation::evaluate(&result.path_lengths, args.mean_free_path, args.tolerance)
    {
        Ok(check) => print_validation(&check),
        Err(e) => {
            error!("validation failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    match Histogram::density(&result.path_lengths, args.bins) {
        Ok(histogram) => print_histogram(&histogram),
        Err(e) => {
            error!("histogram failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn print_summary(result: &SimulationResult) {
    println!("\nSimulated {} neutron collisions.", result.path_lengths.len());
    if let Some(stats) = result.path_length_stats() {
        println!("Average path length per collision: {:.3}", stats.mean);
    }
    if let Some(stats) = result.distance_stats() {
        println!("Average total distance per neutron: {:.3}", stats.mean);
    }
    if let Some(mean) = result.mean_collisions() {
        println!("Average collisions per neutron: {mean:.1}");
    }
    println!("Seed: {}", result.seed);
    if result.capped_particles > 0 {
        println!("Neutrons stopped at the collision cap: {}", result.capped_particles);
    }
    if result.stalled_particles > 0 {
        println!("Neutrons stalled on overlong flights: {}", result.stalled_particles);
    }
    if result.skipped_particles > 0 {
        println!("Neutrons skipped by the budget: {}", result.skipped_particles);
    }
}

fn print_validation(check: &ExponentialValidation) {
    println!("\n=== Physical Validation ===");
    println!("Expected mean free path: {:.3}", check.expected_mean);
    println!("Measured mean free path: {:.3}", check.measured_mean);
    println!("Percent error: {:.2}%", check.mean_error_percent);
    if check.passed {
        println!("✓ Statistical validation: PASSED");
    } else {
        println!("✗ Statistical validation: Large deviation detected");
    }

    println!("\nExpected std deviation: {:.3}", check.expected_std_dev);
    println!("Measured std deviation: {:.3}", check.measured_std_dev);
    println!("Percent error: {:.2}%", check.std_error_percent);
}

fn print_histogram(histogram: &Histogram) {
    println!("\n=== Free Path Distribution ===");
    println!("   Path length    | Density");
    println!("------------------|--------");
    let peak = histogram.densities.iter().copied().fold(0.0_f64, f64::max);
    for (i, density) in histogram.densities.iter().enumerate() {
        let bar = if peak > 0.0 {
            ((density / peak) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        println!(
            "{:7.3} - {:7.3} | {:6.3} {}",
            histogram.edges[i],
            histogram.edges[i + 1],
            density,
            "#".repeat(bar)
        );
    }
}
