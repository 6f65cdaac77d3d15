use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};

use crate::appsettings::EmailSettings;

use super::{Notifier, NotifyError, OutboundMessage};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &EmailSettings, smtp_host: &str) -> anyhow::Result<Self> {
        let from: Mailbox = settings.from.parse()?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)?
            .port(settings.smtp_port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        log::info!("Sending reminders through {smtp_host}:{}", settings.smtp_port);

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| NotifyError::Rejected(format!("invalid recipient {}: {e}", message.to)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| NotifyError::Rejected(e.to_string()))?;

        match self.transport.send(email).await {
            Ok(response) => {
                log::info!(
                    "Email sent. [to = {}, code = {}]",
                    message.to,
                    response.code()
                );
                Ok(())
            }
            Err(e) if e.is_permanent() => Err(NotifyError::Rejected(e.to_string())),
            Err(e) => Err(NotifyError::Transient(e.to_string())),
        }
    }
}
