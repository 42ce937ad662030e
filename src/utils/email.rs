use campus_config::EmailConfig;
use campus_core::AppError;
use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, reset_token))]
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: &str,
        reset_token: &str,
    ) -> Result<(), AppError> {
        let reset_link = self.config.reset_url(reset_token);

        let text_body = format!(
            "Hi {to_name},\n\n\
             You requested to reset your password.\n\n\
             Open the link below to choose a new one:\n\
             {reset_link}\n\n\
             This link expires in 1 hour.\n\n\
             If you didn't request this, you can ignore this email.\n\n\
             Campus"
        );
        let html_body = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<body style="font-family: Arial, sans-serif; color: #333333;">
    <h2>Password reset</h2>
    <p>Hi <strong>{to_name}</strong>,</p>
    <p>You requested to reset your password. Use the link below to choose a new one:</p>
    <p><a href="{reset_link}">{reset_link}</a></p>
    <p><strong>This link expires in 1 hour.</strong></p>
    <p>If you didn't request this, you can ignore this email.</p>
</body>
</html>"#
        );

        self.send_email(to_email, "Password reset request", &text_body, &html_body)
            .await
    }

    #[instrument(skip(self, html_body, text_body))]
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        if !self.config.enabled {
            info!(to = %to_email, subject, "SMTP disabled, email not sent");
            return Ok(());
        }

        let from = self.config.sender();

        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| AppError::internal_error(format!("Invalid from email: {e}")))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| AppError::internal_error(format!("Invalid to email: {e}")))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::internal_error(format!("Failed to build email: {e}")))?;

        let mailer = if self.config.smtp_username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            );
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
                .map_err(|e| AppError::internal_error(format!("Failed to create SMTP relay: {e}")))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        };

        mailer
            .send(email)
            .await
            .map_err(|e| AppError::internal_error(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "noreply@campus.local".to_string(),
            from_name: "Campus".to_string(),
            frontend_url: "http://localhost:5173/".to_string(),
        }
    }

    #[test]
    fn test_reset_link_and_sender() {
        let config = config();
        assert_eq!(
            config.reset_url("abc"),
            "http://localhost:5173/reset-password/abc"
        );
        assert_eq!(config.sender(), "Campus <noreply@campus.local>");
    }

    #[tokio::test]
    async fn test_disabled_smtp_is_a_no_op() {
        let service = EmailService::new(config());
        let result = service
            .send_password_reset_email("ana@campus.edu", "Ana", "token")
            .await;
        assert!(result.is_ok());
    }
}
