use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{fs::File, path::PathBuf};
use tes_bsa::{path, BsaArchive};
use tracing::info;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input BSA file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let mut f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let mut bsa = BsaArchive::new(&mut f)?;

        let names = bsa.paths().map(str::to_owned).collect::<Vec<_>>();
        for name in names {
            path::validate(&name)?;

            let p = self
                .directory
                .join(name.split(path::SEPARATOR).collect::<PathBuf>());
            info!("writing {}", p.display());

            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }
            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            let mut f_bsa = bsa
                .by_path(&name)?
                .ok_or_else(|| miette!("{name} is listed but can not be found"))?;
            std::io::copy(&mut f_bsa, &mut out)
                .into_diagnostic()
                .context(format!("extracting {name}"))?;
        }
        Ok(())
    }
}
