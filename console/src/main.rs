mod cluster;
mod profile;
pub mod utils;

use clap::{
    Parser,
    Subcommand,
};
use cluster::ClusterArgs;
use profile::ProfileArgs;
use utils::UtilsArgs;
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Bin contigs of a merged profile by composition and coverage.
    Cluster {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  ClusterArgs,
    },

    /// Compute coverage and variability of contig splits from a pileup.
    Profile {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  ProfileArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    match cli.command {
        MainMenu::Cluster { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Profile { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
    }
    Ok(())
}
