//! Drives one sign-in through the modal orchestrator.

mod terminal;

use std::sync::Arc;

use auth_session::{
    AuthError, AuthMethod, AuthMode, ChallengeAnchor, ClassifiedError, ErrorCategory,
    IgnoreReason, Identity, Locale, SessionStore, SignInOrchestrator, SubmitOutcome,
};
use dashboard_config_and_utils::{Config, CoreError};
use supabase_identity::{SocialLoginStart, SupabaseError, SupabaseIdentityProvider};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use terminal::{Prompter, TerminalHost, TerminalPrompter};

/// What the user asked the CLI to do.
#[derive(Debug)]
pub enum Command {
    SignIn {
        email: String,
        password: Option<String>,
    },
    SignUp {
        email: String,
        display_name: String,
        password: Option<String>,
    },
    Federated {
        provider: String,
    },
    Phone {
        phone: String,
        captcha_token: Option<String>,
    },
}

impl Command {
    fn method(&self) -> AuthMethod {
        match self {
            Command::SignIn { .. } => AuthMethod::PasswordSignIn,
            Command::SignUp { .. } => AuthMethod::PasswordSignUp,
            Command::Federated { .. } => AuthMethod::Federated,
            Command::Phone { .. } => AuthMethod::PhoneChallenge,
        }
    }
}

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    #[error(transparent)]
    Provider(#[from] SupabaseError),

    #[error(transparent)]
    Flow(#[from] AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local validation or the provider refused the attempt.
    #[error("{}", .0.message())]
    Refused(ClassifiedError),

    #[error("Sign-in did not start: {0:?}")]
    Ignored(IgnoreReason),

    #[error("Sign-in was abandoned")]
    Stale,

    #[error("No verification code entered")]
    NoCode,
}

impl CliError {
    /// Category of a refused attempt, if that is what this is.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            CliError::Refused(classified) => Some(classified.category()),
            _ => None,
        }
    }
}

/// Build the provider, store and orchestrator from `config`.
pub fn build(config: &Config, command: &Command) -> Result<SignInOrchestrator, CliError> {
    let mut provider = SupabaseIdentityProvider::from_config(config)?.with_login_url_handler(
        Arc::new(|start: &SocialLoginStart| terminal::announce_login_url(&start.login_url)),
    );
    if let Command::Federated { provider: social } = command {
        provider = provider.with_social_provider(social.clone());
    }

    let locale = config.locale.parse::<Locale>().unwrap_or_else(|e| {
        warn!(locale = %config.locale, error = %e, "Falling back to English messages");
        Locale::default()
    });

    let store = Arc::new(SessionStore::new(Arc::new(provider)));
    let mut orchestrator =
        SignInOrchestrator::new(store, Arc::new(TerminalHost)).with_locale(locale);
    if let Command::Phone {
        captcha_token: Some(token),
        ..
    } = command
    {
        orchestrator = orchestrator.with_challenge_anchor(ChallengeAnchor::new(token.clone()));
    }
    Ok(orchestrator)
}

/// Run `command` to completion and return the signed-in identity.
pub async fn run(config: &Config, command: Command) -> Result<Identity, CliError> {
    let orchestrator = build(config, &command)?;
    orchestrator.store().resolved().await;
    drive(&orchestrator, command, Arc::new(TerminalPrompter)).await
}

/// Feed `command` through an already-built orchestrator, asking `prompter`
/// for anything the command line left out.
pub async fn drive(
    orchestrator: &SignInOrchestrator,
    command: Command,
    prompter: Arc<dyn Prompter>,
) -> Result<Identity, CliError> {
    info!(method = %command.method(), "Starting sign-in");
    orchestrator.open();

    let outcome = match command {
        Command::SignIn { email, password } => {
            let password = match password {
                Some(password) => password,
                None => ask(&prompter, Ask::Secret, "Password: ").await?,
            };
            orchestrator.choose_email()?;
            orchestrator.set_email(email);
            orchestrator.set_password(password);
            orchestrator.submit_password().await
        }
        Command::SignUp {
            email,
            display_name,
            password,
        } => {
            let password = match password {
                Some(password) => password,
                None => ask(&prompter, Ask::Secret, "Choose a password: ").await?,
            };
            if orchestrator.state().mode != AuthMode::SignUp {
                orchestrator.toggle_mode()?;
            }
            orchestrator.choose_email()?;
            orchestrator.set_email(email);
            orchestrator.set_display_name(display_name);
            orchestrator.set_password(password);
            orchestrator.submit_password().await
        }
        Command::Federated { .. } => orchestrator.submit_federated().await,
        Command::Phone { phone, .. } => {
            orchestrator.set_phone_number(phone);
            match orchestrator.submit_phone().await {
                SubmitOutcome::ChallengeIssued => {
                    let code = ask(&prompter, Ask::Line, "Verification code: ").await?;
                    if code.is_empty() {
                        orchestrator.close();
                        return Err(CliError::NoCode);
                    }
                    orchestrator.set_verification_code(code);
                    orchestrator.submit_verification_code().await
                }
                other => other,
            }
        }
    };

    finish(orchestrator, outcome)
}

fn finish(
    orchestrator: &SignInOrchestrator,
    outcome: SubmitOutcome,
) -> Result<Identity, CliError> {
    match outcome {
        SubmitOutcome::Authenticated(identity) => Ok(identity),
        SubmitOutcome::Rejected(classified) | SubmitOutcome::Failed(classified) => {
            debug!(category = ?classified.category(), "Sign-in refused");
            orchestrator.close();
            Err(CliError::Refused(classified))
        }
        SubmitOutcome::Ignored(reason) => {
            orchestrator.close();
            Err(CliError::Ignored(reason))
        }
        SubmitOutcome::ChallengeIssued | SubmitOutcome::Stale => {
            orchestrator.close();
            Err(CliError::Stale)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Ask {
    Secret,
    Line,
}

/// Terminal reads block, so they run off the async workers.
async fn ask(prompter: &Arc<dyn Prompter>, kind: Ask, label: &str) -> Result<String, CliError> {
    let prompter = Arc::clone(prompter);
    let label = label.to_string();
    let answer = tokio::task::spawn_blocking(move || match kind {
        Ask::Secret => prompter.secret(&label),
        Ask::Line => prompter.line(&label),
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(answer.trim_end_matches(['\r', '\n']).to_string())
}
