use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cfg = biokey::config::Config::parse();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(biokey::run(cfg))
}
