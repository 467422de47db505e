// Login, logout and whoami commands

use crate::commands::pages::print_outcome;
use crate::output::{print_field, OutputFormat};
use crate::session::Shell;
use anyhow::{Context, Result};
use bizdesk_core::{Identity, ReturnPath};
use serde::Serialize;
use std::io::BufRead;

/// Read the password from stdin when it was not given on the command line.
pub fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password required: pass --password, set BIZDESK_PASSWORD or pipe it on stdin");
    }
    Ok(password)
}

pub async fn login(
    shell: &Shell,
    output: OutputFormat,
    quiet: bool,
    username: &str,
    password: &str,
    redirect: Option<&str>,
) -> Result<()> {
    let return_to = redirect.map(ReturnPath::sanitize).unwrap_or_else(ReturnPath::root);
    let outcome = shell.login(username, password, &return_to).await?;

    if output.is_text() && !quiet {
        if let Some(identity) = shell.state().identity() {
            println!("Logged in as {} ({})", identity.username, identity.role);
        }
    }
    print_outcome(&outcome, output)
}

pub async fn logout(shell: &Shell, output: OutputFormat, quiet: bool) -> Result<()> {
    let was_logged_in = shell.state().is_authenticated();
    let outcome = shell.logout().await?;

    if output.is_text() {
        if !quiet {
            println!(
                "{}",
                if was_logged_in {
                    "Logged out"
                } else {
                    "No active session"
                }
            );
        }
        Ok(())
    } else {
        print_outcome(&outcome, output)
    }
}

#[derive(Serialize)]
struct Whoami<'a> {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<&'a Identity>,
}

pub async fn whoami(shell: &Shell, output: OutputFormat) -> Result<()> {
    let state = shell.navigator().store().ready().await;
    let identity = state.identity();

    if !output.is_text() {
        return output.print_value(&Whoami {
            authenticated: identity.is_some(),
            identity,
        });
    }

    match identity {
        Some(identity) => {
            print_field("ID", &identity.id.to_string());
            print_field("Username", &identity.username);
            print_field("Name", &identity.display_name);
            print_field("Email", identity.email.as_deref().unwrap_or("-"));
            print_field("Role", identity.role.as_str());
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_argument_wins_over_stdin() {
        assert_eq!(read_password(Some("secret".to_string())).unwrap(), "secret");
    }
}
