use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pilot_api::Args::parse();

	pilot_api::run(args).await
}
