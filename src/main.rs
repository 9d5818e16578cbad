use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use particle_web::state::RunOptions;
use particle_web::WebParams;
use std::io;
use std::process::ExitCode;

/// Interactive particle web that scatters away from the pointer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Number of particles to simulate
  #[arg(short, long, default_value_t = 1000)]
  particles: u32,
  /// Seed for the initial particle layout
  #[arg(short, long, default_value_t = 42)]
  seed: u64,
  /// Maximum distance at which two particles are connected
  #[arg(short, long, default_value_t = 15.0)]
  connect: f32,
  /// Force reduced mode on or off instead of deciding from the window width
  #[arg(long)]
  reduced: Option<bool>,
  /// Run in headless mode (no window)
  #[arg(long, default_value_t = false)]
  headless: bool,
  /// Frames to simulate in headless mode
  #[arg(long, default_value_t = 600)]
  frames: u64,
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Generate shell completion scripts
  Completions {
    /// The shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
  },
}

fn main() -> ExitCode {
  let args = Args::parse();

  if let Some(Commands::Completions { shell }) = args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    return ExitCode::SUCCESS;
  }

  env_logger::init();

  let params = WebParams {
    num_particles: args.particles,
    seed: args.seed,
    connection_distance: args.connect,
    ..Default::default()
  };
  let options = RunOptions {
    reduced: args.reduced,
    headless: args.headless,
    frames: args.frames,
  };

  match particle_web::state::run(params, options) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      log::error!("{err}");
      ExitCode::FAILURE
    }
  }
}
