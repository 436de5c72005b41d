use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = vix_api::Args::parse();

	vix_api::run(args).await
}
