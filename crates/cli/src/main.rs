// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! # dbfixture
//!
//! Command-line companion to the `dbfixture` test fixtures.
//!
//! - `dbfixture name` prints the in-memory database name a test would use
//! - `dbfixture snapshot --migrations DIR` migrates a fresh database and
//!   prints the script the archive would capture
//! - `dbfixture check-dataset FILE` validates a dataset file
//!
//! Environment configuration (`DBFIXTURE_*`) is honored the same way the
//! fixtures honor it.

#![deny(
    clippy::pedantic,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use color_eyre::{Result, eyre::Context};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_log::AsTrace;

use dbfixture::TestIdentity;
use dbfixture_persistence::{
    Archive, Changelog, DataSource, Dataset, FixtureConfig, MigrationFixture,
};

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match args.run() {
        Ok(()) => (),
        Err(err) => {
            tracing::error!("{err:?}");
            std::process::exit(1);
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "dbfixture", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

impl Args {
    fn run(self) -> Result<()> {
        let config = FixtureConfig::from_env().wrap_err("Invalid DBFIXTURE_* environment")?;
        debug!("Using {:?}", config);
        self.command.run(&config)
    }

    fn log_level(&self) -> LevelFilter {
        self.verbosity.log_level_filter().as_trace()
    }
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Print the connection name derived for the current process and thread
    #[command(visible_alias = "n")]
    Name {
        /// Test class (module path) to include in the name
        #[arg(long)]
        class: Option<String>,

        /// Test method; requires --class
        #[arg(long, requires = "class")]
        method: Option<String>,

        /// Initialization SQL, overriding DBFIXTURE_INIT_SQL
        #[arg(long)]
        init_sql: Option<String>,

        /// Omit the process id segment
        #[arg(long)]
        no_pid: bool,
    },

    /// Migrate a fresh in-memory database and print the captured script
    #[command(visible_alias = "s")]
    Snapshot {
        /// Migration directories, applied in order
        #[arg(long = "migrations", required = true)]
        migrations: Vec<PathBuf>,

        /// Active contexts
        #[arg(long = "context")]
        contexts: Vec<String>,
    },

    /// Parse a dataset file and print its tables and row counts
    #[command(visible_alias = "cd")]
    CheckDataset {
        /// Dataset JSON file
        file: PathBuf,
    },
}

impl Command {
    fn run(self, config: &FixtureConfig) -> Result<()> {
        match self {
            Self::Name {
                class,
                method,
                init_sql,
                no_pid,
            } => {
                name(config, class, method, init_sql, no_pid);
                Ok(())
            }
            Self::Snapshot {
                migrations,
                contexts,
            } => snapshot(config, &migrations, contexts),
            Self::CheckDataset { file } => check_dataset(&file),
        }
    }
}

fn name(
    config: &FixtureConfig,
    class: Option<String>,
    method: Option<String>,
    init_sql: Option<String>,
    no_pid: bool,
) {
    let mut naming = config.naming();
    if let Some(sql) = init_sql {
        naming = naming.with_init_sql(sql);
    }
    if no_pid {
        naming = naming.with_process_id(None);
    }

    let identity = class.map(|class| match method {
        Some(method) => TestIdentity::new(class, method),
        None => TestIdentity::for_class(class),
    });
    println!("{}", naming.derive(identity.as_ref()));
}

fn snapshot(config: &FixtureConfig, migrations: &[PathBuf], contexts: Vec<String>) -> Result<()> {
    let source: Arc<dyn DataSource> = Arc::new(config.data_source());
    let identity = TestIdentity::for_class("dbfixture::snapshot");

    let mut fixture = MigrationFixture::new(Arc::clone(&source)).with_contexts(contexts);
    for dir in migrations {
        fixture = fixture.with_changelog(
            Changelog::directory(dir)
                .wrap_err_with(|| format!("Failed to read migrations from {}", dir.display()))?,
        );
    }

    let mut session = source.connect(Some(&identity))?;
    let applied = fixture.apply(session.connection_mut()?)?;
    info!(
        "Migrated {} (changes applied: {})",
        session.name(),
        applied
    );

    let archive = Archive::new();
    archive
        .save_if_empty(&mut session)
        .wrap_err("Failed to capture snapshot")?;
    session.close();

    print!("{}", archive.snapshot().unwrap_or_default());
    Ok(())
}

fn check_dataset(file: &Path) -> Result<()> {
    let dataset = Dataset::from_path(file)
        .wrap_err_with(|| format!("Invalid dataset {}", file.display()))?;

    for table in &dataset.tables {
        println!("{}: {} rows", table.name, table.rows.len());
    }
    println!(
        "{} tables, {} rows",
        dataset.tables.len(),
        dataset.row_count()
    );
    Ok(())
}
