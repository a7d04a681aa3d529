use anyhow::Result;
use clap::Parser;
use valuta::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    valuta::logging::init(cli.verbose);
    cli.run().await
}
