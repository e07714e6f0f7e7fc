use clap::Parser;
use tickr_lib::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    tickr_lib::init_tracing(config.log_dir.as_deref()).map_err(anyhow::Error::msg)?;
    tickr_lib::run(config).await
}
