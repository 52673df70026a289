//! Terminal stand-in for the dashboard shell.

use std::io::{self, BufRead, Write};

use auth_session::HostSignals;
use tracing::info;

/// Host that reports modal signals on the terminal.
#[derive(Debug, Default)]
pub struct TerminalHost;

impl HostSignals for TerminalHost {
    fn navigate_to_authenticated_area(&self) {
        info!("Navigating to authenticated area");
        eprintln!("Signed in.");
    }

    fn close_auth_modal(&self) {
        info!("Sign-in dismissed");
    }
}

/// Source of values the command line did not provide. Calls may block.
pub trait Prompter: Send + Sync {
    /// Read a secret without echoing it.
    fn secret(&self, label: &str) -> io::Result<String>;

    /// Read one visible line.
    fn line(&self, label: &str) -> io::Result<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn secret(&self, label: &str) -> io::Result<String> {
        rpassword::prompt_password(label)
    }

    fn line(&self, label: &str) -> io::Result<String> {
        eprint!("{label}");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Print the login URL the user has to open to finish federated sign-in.
pub fn announce_login_url(login_url: &str) {
    eprintln!();
    eprintln!("Open this URL in your browser to continue:");
    eprintln!("  {login_url}");
    eprintln!();
}
