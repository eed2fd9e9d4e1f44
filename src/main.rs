use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use paper_digest::utils::logging;
use paper_digest::{App, Config};

#[derive(Parser, Debug)]
#[command(name = "paper-digest")]
#[command(about = "Daily arXiv digest: classify, summarize and rank recent papers")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load(&args.config)?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
