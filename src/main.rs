use anyhow::Context;
use clap::Parser;

use csv_embedder::cli::{Cli, Command};
use csv_embedder::{logging, EmbeddingGenerator};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = real_main(cli) {
        eprintln!("[csv_embedder] fatal error: {e:#}");
        log::error!("Fatal error: {:?}", e);
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> anyhow::Result<()> {
    let _logger = logging::init_logging(cli.log_level.as_deref(), cli.log_dir.as_deref())?;

    let generator = EmbeddingGenerator::load(cli.generator_options())?;
    log::info!(
        "Ready: model={} device={} dims={}",
        generator.model_id().unwrap_or_default(),
        csv_embedder::device::describe(generator.device()),
        generator.hidden_size()
    );

    match cli.command {
        Command::Table {
            column,
            output_dir,
            output_file,
            ..
        } => {
            log::info!("Input table: {}", generator.input_path().display());
            let dest = generator.embed_table(&column, &output_dir, &output_file)?;
            println!("{}", dest.display());
        }
        Command::Text { text } => {
            let vector = generator.embed(&text)?;
            let json = serde_json::to_string(&vector).context("serialize embedding")?;
            println!("{json}");
        }
    }

    Ok(())
}
