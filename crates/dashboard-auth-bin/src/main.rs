//! Dashboard auth CLI - signs in through the same modal flow the dashboard uses.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dashboard_config_and_utils::{init_logging, Config, Paths};

/// Dashboard authentication command-line interface.
#[derive(Parser)]
#[command(name = "dashboard-auth")]
#[command(about = "Sign in to the dashboard from a terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the config value
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.dashboard
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Language of error messages (en, he)
    #[arg(long, global = true)]
    locale: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    SignIn {
        #[arg(short, long)]
        email: String,
        /// Read from stdin when not given
        #[arg(short, long, env = "DASHBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account with email and password
    SignUp {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        display_name: String,
        /// Read from stdin when not given
        #[arg(short, long, env = "DASHBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign in through a social provider in the browser
    Federated {
        #[arg(long, default_value = supabase_identity::DEFAULT_SOCIAL_PROVIDER)]
        provider: String,
    },
    /// Sign in with an SMS verification code
    Phone {
        /// Phone number in E.164 form
        #[arg(long)]
        phone: String,
        /// Captcha token forwarded with the challenge
        #[arg(long)]
        captcha_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    if let Some(locale) = cli.locale {
        config.locale = locale;
    }

    let level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    init_logging("dashboard-auth", &level);

    let command = match cli.command {
        Commands::SignIn { email, password } => app::Command::SignIn { email, password },
        Commands::SignUp {
            email,
            display_name,
            password,
        } => app::Command::SignUp {
            email,
            display_name,
            password,
        },
        Commands::Federated { provider } => app::Command::Federated { provider },
        Commands::Phone {
            phone,
            captcha_token,
        } => app::Command::Phone {
            phone,
            captcha_token,
        },
    };

    match app::run(&config, command).await {
        Ok(identity) => {
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(category = ?e.category(), error = %e, "Sign-in failed");
            Err(e.into())
        }
    }
}
