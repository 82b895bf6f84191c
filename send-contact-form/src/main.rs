mod config;
mod email_body;

use async_once_cell::OnceCell;
use config::{AppConfig, TlsMode};
use email_body::render_submission_email;
use lambda_http::{
    http::{Method, StatusCode},
    run, service_fn, Body, Error, Request, Response,
};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::{Credentials, Mechanism},
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

const CONFIRMATION_MESSAGE: &str = "Заявка успешно отправлена";

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = AppConfig::from_env()?;
    let handler = ContactFormHandler::new(config);
    run(service_fn(|event| handler.handle(event))).await
}

struct ContactFormHandler {
    config: AppConfig,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl ContactFormHandler {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            mailer: Default::default(),
        }
    }

    async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        if event.method() == Method::OPTIONS {
            return Ok(Self::preflight_response());
        }
        if event.method() != Method::POST {
            return Ok(json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &json!({"error": "Method not allowed"}),
            ));
        }
        match self.process_submission(event.body()).await {
            Ok(name) => {
                info!("Relayed contact form submission from {name}");
                Ok(json_response(
                    StatusCode::OK,
                    &json!({"success": true, "message": CONFIRMATION_MESSAGE}),
                ))
            }
            Err(error) => {
                error.log();
                Ok(error.into_response())
            }
        }
    }

    async fn process_submission(&self, body: &[u8]) -> Result<String, ContactFormError> {
        let form: ContactForm = serde_json::from_slice(body).map_err(|error| {
            ContactFormError::ClientError(format!("Request body is not valid JSON: {error}"))
        })?;
        let submission = form.validate()?;
        let email = self.construct_email(&submission)?;
        self.send_email(email).await?;
        Ok(submission.name.into())
    }

    fn construct_email(
        &self,
        submission: &ValidatedSubmission,
    ) -> Result<Message, ContactFormError> {
        let html = render_submission_email(
            submission.name,
            submission.phone,
            submission.email,
            submission.message,
        );
        Message::builder()
            .from(self.config.sender.clone())
            .to(self.config.recipient.clone())
            .subject(submission_subject(submission.name))
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|error| {
                ContactFormError::InternalError(format!("Error building message: {error}"))
            })
    }

    async fn send_email(&self, email: Message) -> Result<(), ContactFormError> {
        let mailer = self
            .mailer
            .get_or_try_init(self.initialise_mailer())
            .await
            .map_err(|error| {
                ContactFormError::InternalError(format!(
                    "Unable to connect to SMTP server: {error}"
                ))
            })?;
        match mailer.send(email).await {
            Ok(_) => Ok(()),
            Err(error) => Err(ContactFormError::InternalError(format!(
                "Error sending message: {error}"
            ))),
        }
    }

    async fn initialise_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, Error> {
        let AppConfig {
            smtp_host,
            smtp_port,
            tls_mode,
            ..
        } = &self.config;
        info!("initialise_mailer: Relaying through {smtp_host}:{smtp_port}");
        let mut builder = match tls_mode {
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)?,
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host),
        };
        builder = builder.port(*smtp_port);

        // Sending credentials over a non-TLS connection is risky, so they are
        // only attached when the transport upgrades via STARTTLS. A plaintext
        // transport (local test servers) goes unauthenticated.
        if *tls_mode == TlsMode::StartTls {
            builder = builder
                .authentication(vec![Mechanism::Plain])
                .credentials(Credentials::new(
                    self.config.smtp_user.clone(),
                    self.config.smtp_password.clone(),
                ));
        }

        Ok(builder.build())
    }

    fn preflight_response() -> Response<Body> {
        Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400")
            .body("".into())
            .unwrap()
    }
}

fn submission_subject(name: &str) -> String {
    format!("Новая заявка с сайта от {name}")
}

fn json_response(status: StatusCode, payload: &serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(payload.to_string().into())
        .unwrap()
}

#[derive(Deserialize, Debug)]
struct ContactForm {
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    message: Option<String>,
}

impl ContactForm {
    fn validate(&self) -> Result<ValidatedSubmission<'_>, ContactFormError> {
        let name = nonempty(&self.name);
        let phone = nonempty(&self.phone);
        let email = nonempty(&self.email);
        let message = nonempty(&self.message);
        let (Some(name), Some(phone), Some(email), Some(message)) = (name, phone, email, message)
        else {
            let failed: Vec<&str> = [
                ("name", name),
                ("phone", phone),
                ("email", email),
                ("message", message),
            ]
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(field, _)| *field)
            .collect();
            return Err(ContactFormError::ClientError(format!(
                "Missing or empty fields: {}",
                failed.join(", ")
            )));
        };

        if email.parse::<Address>().is_err() {
            return Err(ContactFormError::ClientError(format!(
                "Invalid email address {email}"
            )));
        }

        Ok(ValidatedSubmission {
            name,
            phone,
            email,
            message,
        })
    }
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

struct ValidatedSubmission<'a> {
    name: &'a str,
    phone: &'a str,
    email: &'a str,
    message: &'a str,
}

#[derive(Debug)]
enum ContactFormError {
    ClientError(String),
    InternalError(String),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::ClientError(description) => {
                error!("Client error handling contact form submission: {description}");
            }
            ContactFormError::InternalError(description) => {
                error!("Internal error handling contact form submission: {description}");
            }
        }
    }

    fn into_response(self) -> Response<Body> {
        match self {
            ContactFormError::ClientError(description) => {
                json_response(StatusCode::BAD_REQUEST, &json!({"error": description}))
            }
            ContactFormError::InternalError(description) => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": description}),
            ),
        }
    }
}

impl std::fmt::Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::ClientError(description) => {
                write!(f, "Client error: {description}")
            }
            ContactFormError::InternalError(description) => {
                write!(f, "Internal error: {description}")
            }
        }
    }
}

impl std::error::Error for ContactFormError {}
