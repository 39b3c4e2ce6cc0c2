//! Authentication commands.

use super::{connect, report};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use remote_service_client::Credentials;
use session_gate::SessionStatus;
use std::io::{self, Write};
use std::time::Duration;

/// How long to wait for the listener to apply a notification already emitted.
const NOTIFICATION_GRACE: Duration = Duration::from_millis(500);

/// Prompt for email and (hidden) password.
fn prompt_credentials() -> Result<Credentials> {
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;

    let password = rpassword::prompt_password("Password: ")?;
    Ok(Credentials::new(email.trim(), password))
}

/// Login with email and password.
pub async fn login(format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;

    let current = ctx.session.current();
    if current.is_authenticated() {
        let who = current
            .email
            .or(current.user_id)
            .unwrap_or_else(|| "unknown".to_string());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(());
    }

    let credentials = prompt_credentials()?;
    let session = ctx
        .session
        .sign_in(&credentials)
        .await
        .map_err(|e| report(e.kind(), e))?;

    let who = session
        .email
        .or(session.user_id)
        .unwrap_or_else(|| "user".to_string());
    output::print_success(&format!("Logged in as {}", who), format);
    Ok(())
}

/// Create an account.
pub async fn signup(format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;
    let credentials = prompt_credentials()?;
    let before = ctx.session.user_id();

    ctx.session
        .sign_up(&credentials)
        .await
        .map_err(|e| report(e.kind(), e))?;

    // An auto-confirmed sign-up arrives as a notification, already queued by now.
    let mut rx = ctx.session.watch();
    let signed_in = tokio::time::timeout(
        NOTIFICATION_GRACE,
        rx.wait_for(|session| session.is_authenticated() && session.user_id != before),
    )
    .await
    .is_ok_and(|changed| changed.is_ok());
    if signed_in {
        output::print_success("Account created and logged in", format);
    } else {
        output::print_success(
            "Account created. Check your email to confirm it, then run 'bookhive login'",
            format,
        );
    }
    Ok(())
}

/// Logout and clear session.
pub async fn logout(format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;

    match ctx.session.sign_out().await {
        Ok(()) => output::print_success("Logged out successfully", format),
        Err(e) => output::print_error(
            &format!("Logged out locally; the server reported: {}", e),
            format,
        ),
    }
    Ok(())
}

/// Check authentication status.
pub async fn status(format: &OutputFormat) -> Result<()> {
    let ctx = connect().await?;
    let session = ctx.session.current();

    match format {
        OutputFormat::Json => output::print_json(&session),
        OutputFormat::Text => {
            let auth = match session.status {
                SessionStatus::Authenticated => "logged in",
                SessionStatus::Unauthenticated => "not logged in",
                SessionStatus::Unknown => "unknown",
            };
            output::print_heading("Session");
            output::print_row("Auth", auth);
            if let Some(user_id) = &session.user_id {
                output::print_row("User ID", user_id);
            }
            if let Some(email) = &session.email {
                output::print_row("Email", email);
            }
            if let Some(expires_at) = session.expires_at {
                output::print_row("Expires", &expires_at.to_rfc3339());
            }
            if let Some(reason) = &ctx.restore_error {
                output::print_row("Note", reason);
            }
        }
    }
    Ok(())
}
