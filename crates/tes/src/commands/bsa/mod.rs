pub mod extract;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum BsaCommands {
    /// List the contents of a BSA file
    List(list::ListArgs),
    /// Extract a BSA file into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into a BSA file
    Pack(pack::PackArgs),
}

impl BsaCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            BsaCommands::List(list) => list.handle(),
            BsaCommands::Extract(extract) => extract.handle(),
            BsaCommands::Pack(pack) => pack.handle(),
        }
    }
}
