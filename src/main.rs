use clap::Parser;

use kfn_operator::core::config::{compose_config, OperatorConfig};

use crate::args::{Commands, OperatorArgs};

mod args;
mod command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = OperatorArgs::parse();

    let mut cfg: OperatorConfig = compose_config(&args.config, "KFN")?;
    args.apply_to(&mut cfg);

    match args.subcommand {
        None | Some(Commands::Run) => command::run(cfg).await,
        Some(Commands::Crd) => command::print_crd(),
        Some(Commands::Render(render_args)) => command::render(&cfg, &render_args.file),
    }
}
