use anyhow::{Context, Result, anyhow};
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;

/// Mail is fire-and-forget throughout: callers log a send failure and move
/// on, they never fail their own operation over it.
pub async fn send_password_reset_email(config: &Config, to: &str, reset_url: &str) -> Result<()> {
    let (Some(host), Some(user), Some(pass)) = (
        config.email_host.as_deref(),
        config.email_user.as_deref(),
        config.email_pass.as_deref(),
    ) else {
        return Err(anyhow!("email not configured"));
    };

    let from = config
        .email_from
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(user);
    let port = config
        .email_port
        .unwrap_or(if config.email_secure { 465 } else { 587 });

    let builder = if config.email_secure {
        AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
    };
    let transport = builder
        .port(port)
        .credentials(Credentials::new(user.to_string(), pass.to_string()))
        .build();

    let text = [
        "You requested a password reset.",
        "Use the link below to set a new password:",
        reset_url,
        "If you did not request this, you can ignore this email.",
    ]
    .join("\n");
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.6;">
  <h2>Password reset</h2>
  <p>You requested a password reset. Click the button below to set a new password.</p>
  <p>
    <a href="{reset_url}" style="display:inline-block;padding:10px 16px;border-radius:999px;background:#111827;color:#fff;text-decoration:none;">
      Reset password
    </a>
  </p>
  <p style="font-size:12px;color:#6b7280;">If you did not request this, you can ignore this email.</p>
</div>"#
    );

    let message = Message::builder()
        .from(from.parse().context("invalid sender address")?)
        .to(to.parse().context("invalid recipient address")?)
        .subject("Reset your attendance app password")
        .multipart(MultiPart::alternative_plain_html(text, html))?;

    transport.send(message).await?;
    Ok(())
}
