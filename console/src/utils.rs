use binsplorer::utils::n_threads;
use clap::Args;
use log::{
    debug,
    LevelFilter,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        short = 'T',
        long,
        default_value_t = 0,
        help_heading = "UTILS",
        help = "Number of threads to use. 0 lets rayon decide."
    )]
    pub threads: usize,

    #[arg(
        long,
        default_value_t = false,
        help_heading = "UTILS",
        help = "Print debug messages."
    )]
    pub verbose: bool,
}

impl UtilsArgs {
    /// Installs the logger and sizes the library thread pool. Must run
    /// before any parallel work starts.
    pub fn setup(&self) -> anyhow::Result<()> {
        if self.threads > 0 {
            std::env::set_var("BINSPLORER_NUM_THREADS", self.threads.to_string());
        }
        let level = if self.verbose {
            LevelFilter::Debug
        }
        else {
            LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(level)
            .parse_env("RUST_LOG")
            .try_init()?;
        debug!("Using {} threads", n_threads());
        Ok(())
    }
}
