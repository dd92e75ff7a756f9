use clap::{Args, ValueEnum};
use miette::miette;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{collections::HashSet, fs::File, path::PathBuf};
use tes_bsa::{
    build,
    path::normalize,
    types::Version,
    write::{BsaEntry, BsaWriterOptions},
    CompressionLevel, CompressionMode,
};
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    #[default]
    None,
    Ratio80,
    Ratio60,
    Ratio40,
    Ratio20,
    Always,
    Manual,
}

impl From<Mode> for CompressionMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::None => CompressionMode::None,
            Mode::Ratio80 => CompressionMode::Ratio80,
            Mode::Ratio60 => CompressionMode::Ratio60,
            Mode::Ratio40 => CompressionMode::Ratio40,
            Mode::Ratio20 => CompressionMode::Ratio20,
            Mode::Always => CompressionMode::Always,
            Mode::Manual => CompressionMode::Manual,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Level {
    Maximum,
    High,
    #[default]
    Normal,
    Low,
    Fastest,
}

impl From<Level> for CompressionLevel {
    fn from(value: Level) -> Self {
        match value {
            Level::Maximum => CompressionLevel::Maximum,
            Level::High => CompressionLevel::High,
            Level::Normal => CompressionLevel::Normal,
            Level::Low => CompressionLevel::Low,
            Level::Fastest => CompressionLevel::Fastest,
        }
    }
}

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target BSA file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Compression mode
    #[arg(short, long, value_enum, default_value_t = Mode::None)]
    compression: Mode,

    /// Deflate level for compressed files
    #[arg(short, long, value_enum, default_value_t = Level::Normal)]
    level: Level,

    /// Files to compress in manual mode, relative to the input directory
    #[arg(long, value_name = "PATH")]
    manual: Vec<String>,

    /// Write a Fallout 3 archive instead of an Oblivion one
    #[arg(long, default_value_t = false)]
    fallout3: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let manual = self
            .manual
            .iter()
            .map(|p| normalize(p))
            .collect::<HashSet<_>>();

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let name = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = name
                .to_str()
                .ok_or(miette!("unable to convert {} to a string", name.display()))?;
            info!("packing {}", name);

            entries.push(
                BsaEntry::builder()
                    .name(name)
                    .source(file.path())
                    .compress(manual.contains(&normalize(name)))
                    .build(),
            );
        }

        let out = if !self.overwrite {
            File::create_new(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        } else {
            File::create(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        };

        let report = build(
            out,
            entries,
            BsaWriterOptions::builder()
                .compression(self.compression.into())
                .level(self.level.into())
                .version(if self.fallout3 {
                    Version::Fallout3
                } else {
                    Version::Oblivion
                })
                .build(),
        )
        .context("finalizing bsa file")?;

        for skipped in &report.skipped {
            println!("{} {}: {}", "skipped".yellow(), skipped.name, skipped.error);
        }

        Ok(())
    }
}
