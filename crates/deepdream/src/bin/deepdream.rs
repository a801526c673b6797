use std::process::ExitCode;

use clap::Parser;
use deepdream::backend::{DreamAutodiffBackend, DreamBackend};
use deepdream::cli::{Cli, SnapshotWriter};
use deepdream::logger::init_log;
use deepdream::network::Vgg;
use deepdream::raster::{load_image, save_image};
use deepdream::{
    ActivationOracle, DreamConfig, DreamContext, DreamError, DreamObserver, Interrupter, dream,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_log(cli.log_level) {
        eprintln!("Failed to install the logger: {err}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DreamError> {
    let config = match &cli.config {
        Some(path) => DreamConfig::load(path)?,
        None => DreamConfig::new(),
    };
    let config = cli.apply(config);
    if let Some(path) = &cli.save_config {
        config.save(path)?;
        log::info!("Configuration written to {}", path.display());
    }

    let ascent = config.ascent_params()?;
    let pyramid = config.pyramid_params()?;

    let device = Default::default();
    let network: Vgg<DreamAutodiffBackend> = match &cli.weights {
        Some(weights) => config.network.init_pretrained(weights, &device)?,
        None => {
            log::warn!("No weights given, dreaming with a randomly initialized network");
            config.network.init(&device)
        }
    };
    let oracle = ActivationOracle::<DreamAutodiffBackend, _>::new(network, &config.layers)?
        .with_border(config.border);

    let image = load_image::<DreamBackend>(&cli.input, &device)?;

    let interrupter = Interrupter::new();
    let mut observer: Box<dyn DreamObserver<DreamBackend>> = match &cli.snapshots {
        Some(directory) => Box::new(SnapshotWriter::new(directory)?),
        None => Box::new(()),
    };
    let mut context = DreamContext::new(&interrupter, observer.as_mut());

    let dreamed = dream(&oracle, image, &pyramid, &ascent, &mut context)?;
    save_image(dreamed, &cli.output)
}
