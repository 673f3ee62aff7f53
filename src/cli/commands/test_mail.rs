use crate::config::model::Settings;
use crate::error::{MailError, EXIT_FAILURE, EXIT_SUCCESS};
use crate::mail::{test_messages, Mailer, SendmailMailer};

pub fn run_test_mail(settings: &Settings) -> i32 {
    let Some(notifications) = settings.notifications.clone() else {
        eprintln!("Error: {}", MailError::NotConfigured);
        return EXIT_FAILURE;
    };
    send_test_messages(&mut SendmailMailer::new(notifications))
}

pub(crate) fn send_test_messages(mailer: &mut dyn Mailer) -> i32 {
    let mut code = EXIT_SUCCESS;
    for (subject, body) in test_messages() {
        if let Err(err) = mailer.send(&subject, &body) {
            eprintln!("Error sending E-Mail message \"{}\": {}", subject, err);
            code = EXIT_FAILURE;
        }
    }
    code
}
