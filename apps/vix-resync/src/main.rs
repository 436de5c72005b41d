use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = vix_resync::Args::parse();

	vix_resync::run(args).await
}
