//! Customer and operator mail templates.

use padmigrate_core::Job;

use crate::context::MigrationSettings;
use crate::error::MigrationError;
use crate::importer::ImportSummary;
use crate::ports::Email;

/// Multipart report sent to the customer once their archive was imported.
pub fn success_email(
    settings: &MigrationSettings,
    job: &Job,
    summary: &ImportSummary,
    account_created: bool,
    display_name: &str,
) -> Email {
    let mut text = format!(
        "Hi {display_name},\n\n\
         Your hackpad export has been imported.\n\n\
         Documents created: {created}\n\
         Documents skipped: {skipped}\n",
        created = summary.created,
        skipped = summary.skipped,
    );
    let mut html = format!(
        "<p>Hi {name},</p>\
         <p>Your hackpad export has been imported.</p>\
         <ul><li>Documents created: {created}</li><li>Documents skipped: {skipped}</li></ul>",
        name = escape_html(display_name),
        created = summary.created,
        skipped = summary.skipped,
    );

    if account_created {
        text.push_str(&format!(
            "\nAn account was created for {email}. Sign in at {url} using \
             \"forgot password\" to choose a password.\n",
            email = job.email(),
            url = settings.login_url,
        ));
        html.push_str(&format!(
            "<p>An account was created for {email}. Sign in at \
             <a href=\"{url}\">{url}</a> using \"forgot password\" to choose a password.</p>",
            email = escape_html(job.email()),
            url = escape_html(&settings.login_url),
        ));
    }

    text.push_str(&format!("\nReference: {}\n", job.id()));
    html.push_str(&format!("<p>Reference: {}</p>", escape_html(job.id().as_str())));

    Email {
        from: settings.mail_from.clone(),
        to: job.email().to_string(),
        bcc: settings.bcc.clone(),
        subject: "Your hackpad documents have been imported".to_string(),
        text,
        html: Some(html),
    }
}

/// Plaintext failure report sent to the operator.
pub fn failure_email(settings: &MigrationSettings, job: &Job, error: &MigrationError) -> Email {
    let text = format!(
        "Migration job {job_id} failed.\n\n\
         kind: {kind}\n\
         error: {error}\n\
         customer: {email}\n\
         sender: {sender}\n\
         archive: {archive}\n\n\
         The job was left in processing; requeue it once the cause is fixed.\n",
        job_id = job.id(),
        kind = error.kind(),
        email = job.email(),
        sender = job.sender(),
        archive = job.archive().display(),
    );

    Email {
        from: settings.mail_from.clone(),
        to: settings.operator_email.clone(),
        bcc: None,
        subject: format!("[padmigrate] job {} failed ({})", job.id(), error.kind()),
        text,
        html: None,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use padmigrate_core::{AccountId, JobPayload};

    fn job() -> Job {
        Job::from_payload(JobPayload {
            from: "Doe, Jane <jane@x.com>".into(),
            email_address: "jane@x.com".into(),
            attachment: "/spool/exp1.zip".into(),
        })
        .unwrap()
    }

    fn summary() -> ImportSummary {
        ImportSummary {
            created: 2,
            skipped: 1,
            html_files: 3,
            ignored_files: 0,
        }
    }

    #[test]
    fn success_mail_goes_to_customer_with_counts() {
        let settings = MigrationSettings {
            bcc: Some("archive@stekpad.com".into()),
            ..MigrationSettings::default()
        };

        let email = success_email(&settings, &job(), &summary(), false, "Jane Doe");

        assert_eq!(email.to, "jane@x.com");
        assert_eq!(email.bcc.as_deref(), Some("archive@stekpad.com"));
        assert!(email.text.contains("Documents created: 2"));
        assert!(email.text.contains("Documents skipped: 1"));
        assert!(!email.text.contains("account was created"));
        assert!(email.html.unwrap().contains("Documents created: 2"));
    }

    #[test]
    fn new_account_gets_login_note() {
        let settings = MigrationSettings::default();
        let email = success_email(&settings, &job(), &summary(), true, "Jane Doe");

        assert!(email.text.contains("account was created for jane@x.com"));
        assert!(email.text.contains(&settings.login_url));
    }

    #[test]
    fn display_name_is_escaped_in_html_part() {
        let email = success_email(
            &MigrationSettings::default(),
            &job(),
            &summary(),
            false,
            "<script>",
        );
        let html = email.html.unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn failure_mail_names_job_and_kind() {
        let settings = MigrationSettings::default();
        let error = MigrationError::ClientIdentityMissing {
            account_id: AccountId::new(5),
        };

        let email = failure_email(&settings, &job(), &error);

        assert_eq!(email.to, settings.operator_email);
        assert!(email.html.is_none());
        assert!(email.subject.contains("exp1"));
        assert!(email.text.contains("Migration job exp1 failed"));
        assert!(email.text.contains("kind: client_identity_missing"));
    }
}
