//! Session commands.

use bynona_client::BynonaClient;
use bynona_client::validation::LoginForm;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::CommandError;

/// Sign in, prompting on stdin when no password was passed.
///
/// # Errors
///
/// Returns an error if the form is invalid or the API rejects the credentials.
#[allow(clippy::print_stdout)]
pub async fn login(
    client: &BynonaClient,
    email: &str,
    password: Option<String>,
) -> Result<(), CommandError> {
    let password = match password {
        Some(password) => password,
        None => read_password().await?,
    };

    let form = LoginForm {
        email: email.to_string(),
        password: SecretString::from(password),
        remember_me: true,
    };
    let email = form.validate()?;

    let outcome = client.login(&email, &form.password).await?;
    let name = outcome
        .user
        .as_ref()
        .map(bynona_client::api::UserProfile::display_name)
        .unwrap_or_else(|| email.to_string());

    println!("Signed in as {name}");
    if let Some(message) = outcome.message {
        println!("{message}");
    }
    Ok(())
}

#[allow(clippy::print_stderr)]
async fn read_password() -> Result<String, CommandError> {
    eprint!("Password: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Sign out. The local session is cleared even if the API call fails.
///
/// # Errors
///
/// Returns an error if the local session cannot be cleared.
#[allow(clippy::print_stdout)]
pub async fn logout(client: &BynonaClient) -> Result<(), CommandError> {
    client.logout().await?;
    println!("Signed out");
    Ok(())
}

/// Print the stored profile.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
#[allow(clippy::print_stdout)]
pub fn whoami(client: &BynonaClient) -> Result<(), CommandError> {
    if !client.is_authenticated()? {
        println!("Not signed in");
        return Ok(());
    }

    match client.current_user()? {
        Some(user) => {
            println!("{}", user.display_name());
            if let Some(email) = &user.email {
                println!("  email: {email}");
            }
            if let Some(phone) = &user.phone {
                println!("  phone: {phone}");
            }
        }
        None => println!("Signed in (no profile stored)"),
    }
    Ok(())
}
