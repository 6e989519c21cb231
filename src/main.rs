//! herdbook: command-line front end for the goat herd record keeper
//!
//! Every command prints its result as pretty JSON on stdout. Logs go to
//! stderr and are controlled with `RUST_LOG`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use zeroize::Zeroizing;

use herdbook::backup::BackupSchedule;
use herdbook::{Config, HerdService};

#[derive(Parser)]
#[command(name = "herdbook")]
#[command(about = "Goat herd records: pedigree analysis and encrypted backups")]
struct Cli {
    /// Path to configuration file (defaults to <data dir>/config.toml)
    #[arg(short, long, env = "HERDBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(short, long, env = "HERDBOOK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the ancestor graph of a goat
    Tree {
        goat_id: String,
        #[arg(short, long, default_value = "4")]
        generations: usize,
    },

    /// Check a proposed parent assignment without saving it
    Validate {
        goat_id: String,
        #[arg(long)]
        father: Option<String>,
        #[arg(long)]
        mother: Option<String>,
    },

    /// Validate and save a parent assignment
    Assign {
        goat_id: String,
        #[arg(long)]
        father: Option<String>,
        #[arg(long)]
        mother: Option<String>,
    },

    /// Estimate inbreeding risk for a candidate pairing
    Inbreeding { sire_id: String, dam_id: String },

    /// Manage encrypted backups
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Show or change backup settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[derive(Args)]
struct PasswordArg {
    /// Backup password
    #[arg(long, env = "HERDBOOK_BACKUP_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Write a new archive
    Create {
        #[command(flatten)]
        auth: PasswordArg,
        /// Directory to write to instead of the configured backup path
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Replace the record store with an archive's contents
    Restore {
        #[command(flatten)]
        auth: PasswordArg,
        /// Archive id from `backup list`
        #[arg(required_unless_present = "file")]
        archive: Option<String>,
        /// Restore from an archive file anywhere on disk
        #[arg(long, conflicts_with = "archive")]
        file: Option<PathBuf>,
    },
    /// Decrypt and check an archive without restoring it
    Verify {
        #[command(flatten)]
        auth: PasswordArg,
        archive: String,
    },
    /// List archives, newest first
    List,
    /// Delete one archive
    Delete { archive: String },
    /// Delete all but the newest archives
    Prune {
        /// Archives to keep (defaults to keepVersions)
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Run scheduled backups until interrupted
    Auto {
        #[command(flatten)]
        auth: PasswordArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScheduleArg {
    Daily,
    Weekly,
    Manual,
}

impl From<ScheduleArg> for BackupSchedule {
    fn from(arg: ScheduleArg) -> Self {
        match arg {
            ScheduleArg::Daily => BackupSchedule::Daily,
            ScheduleArg::Weekly => BackupSchedule::Weekly,
            ScheduleArg::Manual => BackupSchedule::Manual,
        }
    }
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    Set {
        #[arg(long)]
        auto_backup: Option<bool>,
        #[arg(long, value_enum)]
        schedule: Option<ScheduleArg>,
        #[arg(long)]
        keep_versions: Option<usize>,
        #[arg(long)]
        backup_path: Option<PathBuf>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(herdbook::config::default_data_dir);
    let path = cli.config.clone().unwrap_or_else(|| data_dir.join("config.toml"));

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        if cli.config.is_some() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        Config::default()
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("herdbook=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(data_dir = %config.data_dir.display(), "Opening herd records");

    let service = HerdService::open(&config)?;

    match cli.command {
        Commands::Tree { goat_id, generations } => {
            print_json(&service.build_pedigree_tree(&goat_id, generations).await)?;
        }
        Commands::Validate { goat_id, father, mother } => {
            let result = service
                .validate_parentage(&goat_id, father.as_deref(), mother.as_deref())
                .await;
            print_json(&result)?;
        }
        Commands::Assign { goat_id, father, mother } => {
            let (goat, validation) = service
                .assign_parents(&goat_id, father.as_deref(), mother.as_deref())
                .await?;
            print_json(&serde_json::json!({ "goat": goat, "validation": validation }))?;
        }
        Commands::Inbreeding { sire_id, dam_id } => {
            print_json(&service.analyze_inbreeding(&sire_id, &dam_id).await)?;
        }
        Commands::Backup(cmd) => run_backup(&service, cmd).await?,
        Commands::Settings(cmd) => run_settings(&service, cmd)?,
    }

    Ok(())
}

async fn run_backup(service: &HerdService, cmd: BackupCommands) -> anyhow::Result<()> {
    match cmd {
        BackupCommands::Create { auth, dest } => {
            let password = Zeroizing::new(auth.password);
            print_json(&service.create_backup(&password, dest.as_deref()).await?)?;
        }
        BackupCommands::Restore { auth, archive, file } => {
            let password = Zeroizing::new(auth.password);
            let report = match (file, archive) {
                (Some(file), _) => service.restore_backup_file(&file, &password).await?,
                (None, Some(archive)) => service.restore_backup(&archive, &password).await?,
                (None, None) => anyhow::bail!("an archive id or --file is required"),
            };
            print_json(&report)?;
        }
        BackupCommands::Verify { auth, archive } => {
            let password = Zeroizing::new(auth.password);
            print_json(&service.verify_backup(&archive, &password).await?)?;
        }
        BackupCommands::List => print_json(&service.list_backups()?)?,
        BackupCommands::Delete { archive } => {
            service.delete_backup(&archive)?;
            print_json(&serde_json::json!({ "deleted": archive }))?;
        }
        BackupCommands::Prune { keep } => print_json(&service.prune_backups(keep)?)?,
        BackupCommands::Auto { auth } => {
            let handle = service.start_auto_backup(Zeroizing::new(auth.password));
            let mut state = handle.subscribe();
            info!("Automatic backups running, press Ctrl-C to stop");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted, stopping scheduler");
                        break;
                    }
                    changed = state.changed() => {
                        if changed.is_err() || state.borrow().stopped {
                            break;
                        }
                    }
                }
            }
            print_json(&handle.state())?;
            handle.cancel();
        }
    }
    Ok(())
}

fn run_settings(service: &HerdService, cmd: SettingsCommands) -> anyhow::Result<()> {
    match cmd {
        SettingsCommands::Show => print_json(&service.backup_settings()?)?,
        SettingsCommands::Set {
            auto_backup,
            schedule,
            keep_versions,
            backup_path,
        } => {
            let mut settings = service.backup_settings()?;
            if let Some(auto_backup) = auto_backup {
                settings.auto_backup = auto_backup;
            }
            if let Some(schedule) = schedule {
                settings.schedule = schedule.into();
            }
            if let Some(keep_versions) = keep_versions {
                settings.keep_versions = keep_versions;
            }
            if let Some(backup_path) = backup_path {
                settings.backup_path = backup_path;
            }
            print_json(&service.update_backup_settings(settings)?)?;
        }
    }
    Ok(())
}
