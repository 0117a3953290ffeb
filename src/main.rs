use std::time::Duration;

use anyhow::Context;
use blank_viewer::{
    cli::Args,
    loader,
    nav::Event,
    render::LOADING_MESSAGE,
    session::Session,
    style::Theme,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    blank_viewer::init_tracing(args.verbose);

    let registry = args.registry().context("building dataset registry")?;
    let start = args.start_index(&registry)?;
    tracing::info!(datasets = registry.datasets.len(), "registry ready");

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .context("spinner template")?,
    );
    progress.set_message(LOADING_MESSAGE);
    progress.enable_steady_tick(Duration::from_millis(100));
    let load = loader::load_all(&registry);
    progress.finish_and_clear();

    let mut session = Session::new(registry, load, Theme::auto(args.no_color));
    session.dispatch(Event::ChangeDataset(start));
    session.run()
}
