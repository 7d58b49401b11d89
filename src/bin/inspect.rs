use std::path::PathBuf;

use acnets::{checkpoint, Actor, Critic, Network, NetworkConfig, Tensor};
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Build an actor and a critic, run them on zero inputs and report shapes.
#[derive(Parser, Debug)]
#[command(name = "inspect")]
struct Args {
    /// TOML file with network hyperparameters; overrides the size flags
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 4)]
    state_size: usize,

    #[arg(long, default_value_t = 2)]
    action_size: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = 256)]
    fc1_units: usize,

    #[arg(long, default_value_t = 128)]
    fc2_units: usize,

    /// Rows in the zero-valued probe batch
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Directory to write actor.bin and critic.bin into
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => NetworkConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let config = NetworkConfig::new(args.state_size, args.action_size, args.seed)
                .with_hidden_units(args.fc1_units, args.fc2_units);
            config.validate()?;
            config
        }
    };

    let actor = Actor::from_config(&config)?;
    let critic = Critic::from_config(&config)?;

    for (name, network) in [("actor", &actor as &dyn Network), ("critic", &critic as &dyn Network)] {
        let shapes: Vec<_> = network.layers().iter().map(|layer| layer.weights.shape.clone()).collect();
        info!(network = name, parameters = network.parameter_count(), layers = ?shapes, "built");
    }

    let state = Tensor::zeros(vec![args.batch, config.state_input_width()]);
    let action = Tensor::zeros(vec![args.batch, config.action_input_width()]);

    let policy = actor.forward(&state)?;
    info!(shape = ?policy.shape, values = ?policy.to_vec(), "actor output");

    let value = critic.forward(&state, &action)?;
    info!(shape = ?value.shape, values = ?value.to_vec(), "critic output");

    if let Some(dir) = &args.save_dir {
        checkpoint::save(&actor, dir.join("actor.bin"))?;
        checkpoint::save(&critic, dir.join("critic.bin"))?;
    }

    Ok(())
}
