use reqwest::Client;
use serde::Serialize;

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), String> {
        let request = ResendRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self.client
            .post("https://api.resend.com/emails")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("email send failed: {e}"))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("email API error: {body}"));
        }

        tracing::debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }

    pub async fn send_activation_link(
        &self,
        to: &str,
        username: &str,
        activation_url: &str,
    ) -> Result<(), String> {
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #0f766e;">Verify your email address</h2>
            <p>Hi {username}, confirm this address to activate your account:</p>
            <p style="text-align: center; margin: 24px 0;">
            <a href="{activation_url}" style="background: #0f766e; color: #ffffff; font-weight: bold; padding: 12px 24px; border-radius: 8px; text-decoration: none;">Activate account</a>
            </p>
            <p style="color: #666; margin-top: 20px;">If you did not create this account, you can ignore this email.</p>
            </div>"#
        );

        self.send_email(to, "Verify your email", &html).await
    }

    pub async fn send_password_reset_link(
        &self,
        to: &str,
        username: &str,
        reset_url: &str,
    ) -> Result<(), String> {
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #0f766e;">Reset your password</h2>
            <p>Hi {username}, someone requested a password reset for your account:</p>
            <p style="text-align: center; margin: 24px 0;">
            <a href="{reset_url}" style="background: #0f766e; color: #ffffff; font-weight: bold; padding: 12px 24px; border-radius: 8px; text-decoration: none;">Choose a new password</a>
            </p>
            <p style="color: #666; margin-top: 20px;">If this was not you, no action is needed. The link expires automatically.</p>
            </div>"#
        );

        self.send_email(to, "Reset your password", &html).await
    }
}
