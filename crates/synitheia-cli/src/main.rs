use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod terminal;

#[derive(Parser)]
#[command(name = "synitheia", version, about = "Synitheia habit tracker and focus timer")]
struct Cli {
    /// Act as this user instead of the configured `user.id`
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit definitions, check-ins and rewards
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Show the reward point balance
    Points,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run an interactive focus session
    Focus(commands::focus::FocusArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action, cli.user),
        Commands::Points => commands::points(cli.user),
        Commands::Config { action } => commands::config::run(action),
        Commands::Focus(args) => commands::focus::run(args, cli.user),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
