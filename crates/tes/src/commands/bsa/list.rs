use clap::Args;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tes_bsa::BsaArchive;

#[derive(Args)]
pub struct ListArgs {
    /// An input BSA file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let bsa =
            BsaArchive::open(&self.file).context(format!("path: {}", &self.file.display()))?;

        println!(
            "{} version {:#x}, {} files, flags {:#x}",
            self.file.display().bold(),
            bsa.version() as u32,
            bsa.len(),
            bsa.header().archive_flags,
        );

        for path in bsa.paths() {
            let Some(entry) = bsa.entry(path) else {
                continue;
            };

            if entry.compressed {
                println!("{:>10} {} {}", entry.stored_size, "z".yellow(), path);
            } else {
                println!("{:>10} {} {}", entry.stored_size, "-".dimmed(), path.dimmed());
            }
        }

        Ok(())
    }
}
