use log::debug;
use mailin_embedded::{Handler, Server, SslConfig};
use std::{net::IpAddr, sync::Arc, time::Duration};
use tokio::{
    sync::watch::{self, error::RecvError, Receiver, Sender},
    time::timeout,
};

pub const SMTP_PORT: u16 = 4567;
pub const POISONED_SMTP_PORT: u16 = 4568;

/// Accepts every mail and forwards the raw DATA payload to the test through
/// a watch channel.
#[derive(Clone)]
struct CapturingHandler {
    data: Vec<u8>,
    delivered: Arc<Sender<String>>,
}

impl Handler for CapturingHandler {
    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        debug!("Fake SMTP server got data:\n{}", String::from_utf8_lossy(buf));
        self.data.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        self.delivered
            .send(String::from_utf8(self.data.drain(..).collect()).unwrap())
            .unwrap();
        mailin_embedded::response::OK
    }

    fn auth_plain(
        &mut self,
        authorization_id: &str,
        authentication_id: &str,
        password: &str,
    ) -> mailin_embedded::Response {
        debug!("Fake SMTP server got credentials {authorization_id}, {authentication_id}, {password}");
        mailin_embedded::response::AUTH_OK
    }
}

/// In-process plaintext SMTP server capturing everything it receives.
pub struct FakeSmtpServer(
    std::sync::Mutex<Option<Server<CapturingHandler>>>,
    tokio::sync::Mutex<Receiver<String>>,
);

impl FakeSmtpServer {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel("".into());
        let handler = CapturingHandler {
            data: Vec::new(),
            delivered: Arc::new(sender),
        };
        let mut server = Server::new(handler);
        server
            .with_name("fake-smtp.test")
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_addr(format!("0.0.0.0:{SMTP_PORT}"))
            .unwrap();
        Self(
            std::sync::Mutex::new(Some(server)),
            tokio::sync::Mutex::new(receiver),
        )
    }

    pub fn start(&self) {
        let mut guard = self.0.lock().unwrap();
        if let Some(server) = guard.take() {
            std::thread::spawn(move || {
                let _ = server.serve();
            });
        }
    }

    pub async fn last_mail_content(&self) -> Result<String, RecvError> {
        let mut receiver = self.1.lock().await;
        receiver.changed().await?;
        let content = receiver.borrow_and_update().clone();
        drop(receiver);
        Ok(content)
    }

    pub async fn flush(&self) {
        let mut receiver = self.1.lock().await;
        let _ = timeout(Duration::from_millis(100), receiver.changed()).await;
    }

    /// Points the handler's SMTP configuration at this server. The transport
    /// must run in plaintext mode since the fake server cannot terminate TLS.
    pub fn setup_environment() {
        std::env::set_var("SMTP_HOST", "localhost");
        std::env::set_var("SMTP_PORT", SMTP_PORT.to_string());
        std::env::set_var("SMTP_TLS", "none");
        std::env::set_var("SMTP_USER", "noreply@example.com");
        std::env::set_var("SMTP_PASSWORD", "fake SMTP password");
        std::env::set_var("EMAIL_TO", "owner@example.com");
    }
}

impl Default for FakeSmtpServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Refuses every session, so a send against it always fails.
#[derive(Clone)]
struct PoisonedHandler;

impl Handler for PoisonedHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }
}

pub fn start_poisoned_smtp_server() {
    let mut server = Server::new(PoisonedHandler);
    server
        .with_name("fake-smtp.test")
        .with_ssl(SslConfig::None)
        .unwrap()
        .with_addr(format!("0.0.0.0:{POISONED_SMTP_PORT}"))
        .unwrap();
    std::thread::spawn(move || {
        let _ = server.serve();
    });
}
