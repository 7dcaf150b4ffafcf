//! Terminal prompt cho email và master password của Bitwarden.

use anyhow::{bail, Context, Result};
use dialoguer::Input;
use keychain2bitwarden::{CredentialPrompt, Secret};

/// Hỏi credentials trên terminal
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn email(&self) -> Result<String> {
        let email: String = Input::new()
            .with_prompt("Bitwarden email")
            .interact_text()
            .context("Cannot read email")?;
        Ok(email.trim().to_string())
    }

    /// Không hiển thị input
    fn master_password(&self) -> Result<Secret> {
        let password = rpassword::prompt_password("Bitwarden master password: ")
            .context("Cannot read master password")?;

        if password.is_empty() {
            bail!("Master password cannot be empty");
        }

        Ok(Secret::from(password))
    }
}
