use clap::Parser;
use haarsearch::Opts;
use haarsearch::cli::SubCommandExtend;
use haarsearch::config::SubCommand;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::Signature(config) => config.run(&opts).await,
        SubCommand::Duplicates(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
