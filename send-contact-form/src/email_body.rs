use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

const NEW_SUBMISSION_TEMPLATE_NAME: &str = "new-submission-template";
const NEW_SUBMISSION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/new-submission.html"
));

#[derive(Serialize)]
struct Context<'a> {
    name: &'a str,
    phone: &'a str,
    email: &'a str,
    message: &'a str,
}

/// Renders the notification email body. Field values are embedded verbatim;
/// the receiving mail client renders them as text.
pub fn render_submission_email(name: &str, phone: &str, email: &str, message: &str) -> String {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(NEW_SUBMISSION_TEMPLATE_NAME, NEW_SUBMISSION_TEMPLATE)
        .unwrap();
    let context = Context {
        name,
        phone,
        email,
        message,
    };
    tt.render(NEW_SUBMISSION_TEMPLATE_NAME, &context).unwrap()
}
