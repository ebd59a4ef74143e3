use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use ultrafocus_lib::{
    commands::{self, TimePeriod},
    config::{default_config_path, Config},
    db::Database,
    error::AppError,
    models::BlockedApp,
};

#[derive(Parser)]
#[command(name = "ultrafocus", version, about = "Block distracting apps on a schedule")]
struct Cli {
    /// Path to config.json (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the foreground app and enforce block rules
    Run {
        /// Log block decisions without redirecting
        #[arg(long)]
        dry_run: bool,
    },
    /// Add or replace a block rule (package ids are lowercase WM_CLASS names on X11)
    Block {
        package: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Window start, HH:MM
        #[arg(long, requires_all = ["to", "repeat"])]
        from: Option<String>,
        /// Window end, HH:MM
        #[arg(long, requires_all = ["from", "repeat"])]
        to: Option<String>,
        /// DAILY, WEEKLY or MONTHLY
        #[arg(long, requires_all = ["from", "to"])]
        repeat: Option<String>,
    },
    /// Remove a block rule
    Unblock { package: String },
    /// List block rules
    List,
    /// Set the time period of one rule, or of every rule
    Period {
        /// Only change this package
        #[arg(long)]
        package: Option<String>,
        #[arg(long, required_unless_present = "clear", requires_all = ["to", "repeat"])]
        from: Option<String>,
        #[arg(long, required_unless_present = "clear")]
        to: Option<String>,
        #[arg(long, required_unless_present = "clear")]
        repeat: Option<String>,
        /// Remove the time period so the rule always blocks
        #[arg(long, conflicts_with_all = ["from", "to", "repeat"])]
        clear: bool,
    },
    /// Remove every block rule
    Clear,
    /// Show whether a rule would block now, or at --at "YYYY-MM-DD HH:MM"
    Check {
        package: String,
        #[arg(long)]
        at: Option<String>,
    },
}

fn period_from_args(
    from: Option<String>,
    to: Option<String>,
    repeat: Option<String>,
) -> Option<TimePeriod> {
    match (from, to, repeat) {
        (Some(from), Some(to), Some(repeat)) => Some(TimePeriod::new(&from, &to, &repeat)),
        _ => None,
    }
}

fn parse_at(at: Option<&str>) -> Result<NaiveDateTime, AppError> {
    match at {
        None => Ok(Local::now().naive_local()),
        Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").map_err(|e| {
            AppError::InvalidInput {
                field: "at",
                reason: e.to_string(),
            }
        }),
    }
}

fn describe(app: &BlockedApp) -> String {
    match (&app.from_time, &app.to_time, &app.repeat_mode) {
        (Some(from), Some(to), Some(repeat)) => {
            format!("{} ({}) {from}-{to} {repeat}", app.package_id, app.app_name)
        }
        _ => format!("{} ({}) always", app.package_id, app.app_name),
    }
}

fn open_db(config: &Config) -> Result<Database, AppError> {
    Ok(Database::open_and_migrate(&config.database_path()?)?)
}

#[allow(clippy::print_stdout, reason = "CLI output goes to stdout")]
fn execute(command: Commands, config: &Config) -> Result<(), AppError> {
    match command {
        Commands::Run { dry_run } => {
            let stats = ultrafocus_lib::run(config, dry_run)?;
            println!(
                "Processed {} events, blocked {} times",
                stats.events, stats.blocked
            );
        }
        Commands::Block {
            package,
            name,
            from,
            to,
            repeat,
        } => {
            let db = open_db(config)?;
            let period = period_from_args(from, to, repeat);
            let app =
                commands::block_app(db.connection(), &package, name.as_deref(), period.as_ref())?;
            println!("Blocked {}", describe(&app));
        }
        Commands::Unblock { package } => {
            let db = open_db(config)?;
            commands::unblock_app(db.connection(), &package)?;
            println!("Unblocked {package}");
        }
        Commands::List => {
            let db = open_db(config)?;
            let apps = commands::list_apps(db.connection())?;
            if apps.is_empty() {
                println!("No blocked apps");
            }
            for app in &apps {
                println!("{}", describe(app));
            }
        }
        Commands::Period {
            package,
            from,
            to,
            repeat,
            clear,
        } => {
            let db = open_db(config)?;
            let period = if clear {
                None
            } else {
                Some(period_from_args(from, to, repeat).ok_or(AppError::InvalidInput {
                    field: "period",
                    reason: "--from, --to and --repeat are required".into(),
                })?)
            };
            let changed =
                commands::set_time_period(db.connection(), package.as_deref(), period.as_ref())?;
            println!("Updated {changed} rules");
        }
        Commands::Clear => {
            let db = open_db(config)?;
            let removed = commands::clear_all(db.connection())?;
            println!("Removed {removed} rules");
        }
        Commands::Check { package, at } => {
            let db = open_db(config)?;
            let at = parse_at(at.as_deref())?;
            let active = commands::check_app(db.connection(), &package, &at)?;
            let verdict = if active { "blocked" } else { "allowed" };
            println!("{package} is {verdict} at {}", at.format("%Y-%m-%d %H:%M"));
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = cli
        .config
        .map_or_else(default_config_path, Ok)
        .and_then(|path| Config::load(&path))
        .and_then(|config| execute(cli.command, &config));

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
