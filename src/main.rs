use clap::Parser;
use resinkit::{app, init_logging, Args};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs)?;
    app::run(&args)
}
