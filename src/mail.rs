use async_trait::async_trait;
use tracing::info;

/// Password-recovery message handed to the delivery channel.
#[derive(Debug, Clone)]
pub struct ResetMail {
    pub from: String,
    pub to: String,
    pub token: String,
    pub link: String,
}

impl ResetMail {
    pub fn new(from: &str, to: &str, token: String, url_base: &str) -> Self {
        let link = format!("{}/{}", url_base.trim_end_matches('/'), token);
        Self {
            from: from.to_string(),
            to: to.to_string(),
            token,
            link,
        }
    }

    pub fn subject(&self) -> &'static str {
        "Restore your password"
    }

    pub fn body(&self) -> String {
        format!(
            "We received a request to change your password.\n\
             Open the following link to choose a new one:\n\n{}\n\n\
             If you did not ask for this, ignore this email.",
            self.link
        )
    }
}

#[async_trait]
pub trait MailClient: Send + Sync {
    async fn send(&self, mail: ResetMail) -> anyhow::Result<()>;
}

/// Writes outgoing mail to the log instead of a provider. Used in development.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl MailClient for LogMailer {
    async fn send(&self, mail: ResetMail) -> anyhow::Result<()> {
        info!(
            from = %mail.from,
            to = %mail.to,
            subject = mail.subject(),
            body = %mail.body(),
            "mail delivered to log"
        );
        Ok(())
    }
}
