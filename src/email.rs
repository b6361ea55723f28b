use lettre::{
    message::Mailbox,
    transport::smtp::{authentication::Credentials, response::Response as LettreResponse},
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Outgoing mail for password reset links.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    pub from: Mailbox,
    pub frontend_host: String,
}

impl Mailer {
    pub fn new(
        relay: &str,
        username: String,
        password: String,
        frontend_host: String,
    ) -> anyhow::Result<Mailer> {
        let address = username.parse::<Address>()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Mailer {
            transport,
            from: Mailbox::new(Some("Campus Club Hub".to_string()), address),
            frontend_host,
        })
    }

    /// Checks the relay accepts our credentials.
    pub async fn sanity_check(&self) -> anyhow::Result<()> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            Err(anyhow::anyhow!("smtp relay refused the connection"))
        }
    }

    pub async fn send(&self, msg: Message) -> anyhow::Result<LettreResponse> {
        Ok(self.transport.send(msg).await?)
    }
}
