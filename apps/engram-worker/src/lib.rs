use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod worker;

#[derive(Debug, Parser)]
#[command(
	version = engram_cli::VERSION,
	rename_all = "kebab",
	styles = engram_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = engram_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = engram_storage::db::Db::connect(&config.storage.postgres).await?;
	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let state = worker::WorkerState {
		db,
		vector_dim: config.providers.embedding.dimensions,
		embedding: config.providers.embedding,
	};

	worker::run_worker(state).await
}
