use std::process::Command;

use chrono::Local;
use tracing::debug;

use crate::config::model::NotificationConfig;
use crate::error::MailError;
use crate::util::command::run_with_input;

pub const SUBJECT_PREFIX: &str = "dupvault: Backup results for configuration";

pub trait Mailer {
    fn send(&mut self, subject: &str, body: &[String]) -> Result<(), MailError>;
}

pub fn result_subject(config_name: &str, success: bool) -> String {
    let result = if success { "success" } else { "FAILURE" };
    format!("{} {} ({})", SUBJECT_PREFIX, config_name, result)
}

/// The two canned messages sent by `--test-mail`.
pub fn test_messages() -> [(String, Vec<String>); 2] {
    [
        (
            result_subject("test", true),
            vec!["This is a test E-Mail message for a successful backup job".to_string()],
        ),
        (
            result_subject("test", false),
            vec!["This is a test E-Mail message for a failed backup job".to_string()],
        ),
    ]
}

/// Hands messages to a `sendmail -t` compatible program.
pub struct SendmailMailer {
    config: NotificationConfig,
}

impl SendmailMailer {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    fn compose(&self, subject: &str, body: &[String]) -> String {
        let mut message = String::new();
        message.push_str(&format!("From: {}\r\n", self.config.from));
        message.push_str(&format!("To: {}\r\n", self.config.to.join(", ")));
        message.push_str(&format!("Subject: {}\r\n", subject));
        message.push_str(&format!("Date: {}\r\n", Local::now().to_rfc2822()));
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
        for line in body {
            message.push_str(line);
            message.push_str("\r\n");
        }
        message
    }
}

impl Mailer for SendmailMailer {
    fn send(&mut self, subject: &str, body: &[String]) -> Result<(), MailError> {
        let program = self.config.sendmail.clone();
        let mut cmd = Command::new(&program);
        cmd.arg("-t").arg("-i");
        debug!(program = %program, subject, lines = body.len(), "sending mail");
        let code = run_with_input(&mut cmd, self.compose(subject, body).as_bytes())
            .map_err(|source| MailError::Transport {
                program: program.clone(),
                source,
            })?;
        if code != 0 {
            return Err(MailError::Rejected { program, code });
        }
        Ok(())
    }
}

/// Used when no notifications are configured; every send fails.
pub struct Unconfigured;

impl Mailer for Unconfigured {
    fn send(&mut self, _subject: &str, _body: &[String]) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn notification(sendmail: String) -> NotificationConfig {
        NotificationConfig {
            from: "backup@example.com".to_string(),
            to: vec!["ops@example.com".to_string(), "me@example.com".to_string()],
            sendmail,
        }
    }

    #[test]
    fn subjects_name_configuration_and_result() {
        assert_eq!(
            result_subject("home", true),
            "dupvault: Backup results for configuration home (success)"
        );
        assert!(result_subject("home", false).ends_with("(FAILURE)"));
        let [ok, failed] = test_messages();
        assert!(ok.0.ends_with("test (success)"));
        assert!(failed.1[0].contains("failed backup job"));
    }

    #[test]
    fn sendmail_receives_headers_and_body() {
        let dir = TempDir::new().expect("tempdir");
        let capture = dir.path().join("message.txt");
        let script = dir.path().join("sendmail");
        fs::write(
            &script,
            format!("#!/bin/sh\ncat > '{}'\n", capture.display()),
        )
        .expect("script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let mut mailer = SendmailMailer::new(notification(script.to_string_lossy().to_string()));
        mailer
            .send("subject line", &["10:00:00 first".to_string(), "Error: x".to_string()])
            .expect("send");

        let message = fs::read_to_string(&capture).expect("captured");
        assert!(message.contains("To: ops@example.com, me@example.com\r\n"));
        assert!(message.contains("Subject: subject line\r\n"));
        assert!(message.ends_with("\r\n\r\n10:00:00 first\r\nError: x\r\n"));
    }

    #[test]
    fn rejected_and_missing_transport_are_errors() {
        let dir = TempDir::new().expect("tempdir");
        let mut missing = SendmailMailer::new(notification(
            dir.path().join("absent").to_string_lossy().to_string(),
        ));
        assert!(matches!(
            missing.send("s", &[]),
            Err(MailError::Transport { .. })
        ));

        let mut rejecting = SendmailMailer::new(notification("false".to_string()));
        assert!(matches!(
            rejecting.send("s", &[]),
            Err(MailError::Rejected { code: 1, .. }) | Err(MailError::Transport { .. })
        ));
        assert!(Unconfigured.send("s", &[]).is_err());
    }
}
