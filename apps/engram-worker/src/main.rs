use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = engram_worker::Args::parse();

	engram_worker::run(args).await
}
