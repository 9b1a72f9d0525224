use anyhow::Result;
use clap::Parser;
use s2_composite::cli::Cli;
use s2_composite::composite::download_tiff;
use s2_composite::earthengine::Provider;
use s2_composite::logger;
use s2_composite::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logging(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::read(path)?,
        None => Settings::default(),
    }
    .with_env();
    let provider = Provider::from_settings(&settings)?;

    download_tiff(
        &provider,
        &cli.geojson,
        &cli.start_date,
        &cli.end_date,
        &cli.output_file,
    )
    .await?;

    Ok(())
}
