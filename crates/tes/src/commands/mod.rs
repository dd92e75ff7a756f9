pub mod bsa;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle BSA files
    Bsa {
        #[command(subcommand)]
        command: bsa::BsaCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Bsa { command } => command.handle(),
        }
    }
}
