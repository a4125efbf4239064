//! End-to-end tests for the harvest pipeline against an in-memory mailbox.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use mailharvest::error::{HarvestError, Result};
use mailharvest::export::json;
use mailharvest::harvest::{harvest, list_remote_folders, ProgressEvent};
use mailharvest::session::connect::{ConnectError, FailureStage, ServerCandidate};
use mailharvest::session::{Connector, Credentials, MailSession};
use mailharvest::stats;

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn simple(from: &str, subject: &str, date: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\nTo: me@example.com\r\nSubject: {subject}\r\nDate: {date}\r\n\r\nbody of {subject}\r\n"
    )
    .into_bytes()
}

// ─── In-memory mailbox ──────────────────────────────────────────────

#[derive(Clone, Default)]
struct FakeFolder {
    /// EXAMINE fails.
    unselectable: bool,
    /// SEARCH fails.
    search_fails: bool,
    /// `None` makes the FETCH of that sequence number fail.
    messages: Vec<Option<Vec<u8>>>,
}

#[derive(Default)]
struct Journal {
    connects: Vec<String>,
    examined: Vec<String>,
    logouts: usize,
}

#[derive(Clone)]
struct FakeMailbox {
    list_reply: Option<Vec<String>>,
    folders: BTreeMap<String, FakeFolder>,
    journal: Rc<RefCell<Journal>>,
}

impl FakeMailbox {
    fn new() -> Self {
        Self {
            list_reply: Some(Vec::new()),
            folders: BTreeMap::new(),
            journal: Rc::default(),
        }
    }

    /// Add a folder and the matching LIST line.
    fn folder(mut self, name: &str, folder: FakeFolder) -> Self {
        if let Some(reply) = self.list_reply.as_mut() {
            reply.push(format!("* LIST (\\HasNoChildren) \".\" \"{name}\""));
        }
        self.folders.insert(name.to_string(), folder);
        self
    }

    fn with_messages(self, name: &str, messages: Vec<Vec<u8>>) -> Self {
        self.folder(
            name,
            FakeFolder {
                messages: messages.into_iter().map(Some).collect(),
                ..Default::default()
            },
        )
    }
}

struct FakeSession {
    mailbox: FakeMailbox,
    selected: Option<String>,
}

impl MailSession for FakeSession {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        self.mailbox
            .list_reply
            .clone()
            .ok_or_else(|| HarvestError::Session("LIST rejected".into()))
    }

    fn examine(&mut self, folder: &str) -> Result<u32> {
        self.mailbox.journal.borrow_mut().examined.push(folder.to_string());
        match self.mailbox.folders.get(folder) {
            Some(f) if !f.unselectable => {
                self.selected = Some(folder.to_string());
                Ok(f.messages.len() as u32)
            }
            _ => Err(HarvestError::Session(format!("NO [NONEXISTENT] {folder}"))),
        }
    }

    fn search_all(&mut self) -> Result<Vec<u32>> {
        let folder = self.current()?;
        if folder.search_fails {
            return Err(HarvestError::Session("BAD SEARCH".into()));
        }
        Ok((1..=folder.messages.len() as u32).collect())
    }

    fn fetch_raw(&mut self, id: u32) -> Result<Vec<u8>> {
        let folder = self.current()?;
        folder
            .messages
            .get(id as usize - 1)
            .cloned()
            .flatten()
            .ok_or_else(|| HarvestError::Session(format!("FETCH {id} failed")))
    }

    fn logout(&mut self) -> Result<()> {
        self.mailbox.journal.borrow_mut().logouts += 1;
        Ok(())
    }
}

impl FakeSession {
    fn current(&self) -> Result<FakeFolder> {
        self.selected
            .as_ref()
            .and_then(|f| self.mailbox.folders.get(f))
            .cloned()
            .ok_or_else(|| HarvestError::Session("no folder selected".into()))
    }
}

/// Accepts only `good_host` with password `secret`.
struct FakeConnector {
    good_host: &'static str,
    mailbox: FakeMailbox,
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    fn connect(
        &self,
        candidate: &ServerCandidate,
        _user: &str,
        password: &str,
    ) -> std::result::Result<FakeSession, ConnectError> {
        self.mailbox
            .journal
            .borrow_mut()
            .connects
            .push(candidate.to_string());
        if candidate.host != self.good_host {
            return Err(ConnectError::new(FailureStage::Transport, "connection refused"));
        }
        if password != "secret" {
            return Err(ConnectError::new(
                FailureStage::Authentication,
                "NO [AUTHENTICATIONFAILED]",
            ));
        }
        Ok(FakeSession {
            mailbox: self.mailbox.clone(),
            selected: None,
        })
    }
}

fn connector(mailbox: FakeMailbox) -> FakeConnector {
    FakeConnector {
        good_host: "imap.example.com",
        mailbox,
    }
}

fn creds() -> Credentials {
    Credentials::new("me@example.com", Some("secret".into()))
}

fn candidates() -> Vec<ServerCandidate> {
    vec![
        ServerCandidate::new("mail.example.com", 993, true),
        ServerCandidate::new("imap.example.com", 993, true),
    ]
}

// ─── Pipeline ───────────────────────────────────────────────────────

#[test]
fn test_full_harvest_from_fixtures() {
    let mailbox = FakeMailbox::new()
        .with_messages("INBOX", vec![fixture("plain.eml"), fixture("with_attachment.eml")])
        .with_messages("Archive", Vec::new());
    let conn = connector(mailbox.clone());

    let snap = harvest(&conn, &creds(), &candidates(), None).unwrap();

    assert_eq!(snap.folders(), ["Archive", "INBOX"]);
    assert_eq!(snap.messages().len(), 2);

    let plain = &snap.folder_messages("INBOX")[0];
    assert_eq!(plain.folder, "INBOX");
    assert_eq!(plain.from_name, "Alice Example");
    assert_eq!(plain.from_email, "alice@example.com");
    assert_eq!(plain.to, vec!["bob@example.org", "carol@example.net"]);
    assert_eq!(plain.cc, vec!["dave@example.org"]);
    assert_eq!(plain.subject, "Café ☕ report");
    assert_eq!(plain.date, "2024-03-05T14:30:00+01:00");
    assert_eq!(plain.message_id, "<plain-001@example.com>");
    assert!(plain.body_text.contains("quarterly report"));
    assert!(!plain.has_attachments);

    let report = &snap.folder_messages("INBOX")[1];
    assert!(report.body_text.contains("See attached."));
    assert!(report.body_html_preview.contains("<p>See attached.</p>"));
    assert!(report.has_attachments);
    assert_eq!(report.attachments.len(), 1);
    assert_eq!(report.attachments[0].filename, "report.pdf");
    assert_eq!(report.attachments[0].content_type, "application/pdf");
    assert_eq!(report.attachments[0].size_bytes, 9);

    let journal = mailbox.journal.borrow();
    assert_eq!(journal.connects.len(), 2);
    assert_eq!(journal.logouts, 1);
}

#[test]
fn test_unselectable_folder_is_skipped() {
    let mailbox = FakeMailbox::new()
        .folder(
            "Broken",
            FakeFolder {
                unselectable: true,
                messages: vec![Some(simple("x@x.com", "lost", "Mon, 1 Jul 2024 08:30:00 +0000"))],
                ..Default::default()
            },
        )
        .with_messages(
            "INBOX",
            vec![simple("a@x.com", "kept", "Mon, 1 Jul 2024 08:30:00 +0000")],
        );
    let conn = connector(mailbox.clone());

    let snap = harvest(&conn, &creds(), &candidates(), None).unwrap();

    assert_eq!(snap.folders(), ["Broken", "INBOX"]);
    assert!(snap.folder_messages("Broken").is_empty());
    assert_eq!(snap.folder_messages("INBOX").len(), 1);
    assert_eq!(mailbox.journal.borrow().examined, vec!["Broken", "INBOX"]);
    assert_eq!(mailbox.journal.borrow().logouts, 1);
}

#[test]
fn test_failed_search_yields_empty_folder() {
    let mailbox = FakeMailbox::new().folder(
        "INBOX",
        FakeFolder {
            search_fails: true,
            messages: vec![Some(simple("a@x.com", "s", "Mon, 1 Jul 2024 08:30:00 +0000"))],
            ..Default::default()
        },
    );
    let snap = harvest(&connector(mailbox), &creds(), &candidates(), None).unwrap();
    assert_eq!(snap.folders(), ["INBOX"]);
    assert!(snap.messages().is_empty());
}

#[test]
fn test_failed_message_is_skipped_and_order_kept() {
    let mailbox = FakeMailbox::new().folder(
        "INBOX",
        FakeFolder {
            messages: vec![
                Some(simple("a@x.com", "first", "Mon, 1 Jul 2024 08:30:00 +0000")),
                None,
                Some(Vec::new()),
                Some(simple("b@x.com", "fourth", "Tue, 2 Jul 2024 08:30:00 +0000")),
            ],
            ..Default::default()
        },
    );
    let snap = harvest(&connector(mailbox), &creds(), &candidates(), None).unwrap();
    let subjects: Vec<&str> = snap.messages().iter().map(|m| m.subject.as_str()).collect();
    assert_eq!(subjects, vec!["first", "fourth"]);
}

#[test]
fn test_list_failure_gives_empty_snapshot() {
    let mut mailbox = FakeMailbox::new().with_messages("INBOX", vec![fixture("plain.eml")]);
    mailbox.list_reply = None;
    let conn = connector(mailbox.clone());

    let snap = harvest(&conn, &creds(), &candidates(), None).unwrap();
    assert!(snap.folders().is_empty());
    assert!(snap.messages().is_empty());
    assert_eq!(mailbox.journal.borrow().logouts, 1);
}

#[test]
fn test_duplicate_list_lines_fetch_once() {
    let mut mailbox = FakeMailbox::new().with_messages(
        "INBOX",
        vec![simple("a@x.com", "only", "Mon, 1 Jul 2024 08:30:00 +0000")],
    );
    if let Some(reply) = mailbox.list_reply.as_mut() {
        reply.push("* LIST (\\HasNoChildren) \".\" INBOX".to_string());
    }
    let snap = harvest(&connector(mailbox), &creds(), &candidates(), None).unwrap();
    assert_eq!(snap.folders(), ["INBOX"]);
    assert_eq!(snap.messages().len(), 1);
}

// ─── Fatal errors ───────────────────────────────────────────────────

#[test]
fn test_missing_password_makes_no_connection() {
    let mailbox = FakeMailbox::new();
    let conn = connector(mailbox.clone());
    let err = harvest(
        &conn,
        &Credentials::new("me@example.com", None),
        &candidates(),
        None,
    )
    .unwrap_err();

    assert!(matches!(err, HarvestError::CredentialMissing { .. }));
    assert!(err.is_fatal());
    assert!(mailbox.journal.borrow().connects.is_empty());
    assert_eq!(mailbox.journal.borrow().logouts, 0);
}

#[test]
fn test_wrong_password_exhausts_candidates() {
    let mailbox = FakeMailbox::new();
    let conn = connector(mailbox.clone());
    let err = harvest(
        &conn,
        &Credentials::new("me@example.com", Some("wrong".into())),
        &candidates(),
        None,
    )
    .unwrap_err();

    match err {
        HarvestError::ConnectionExhausted { ref failures } => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].stage, FailureStage::Transport);
            assert_eq!(failures[1].stage, FailureStage::Authentication);
        }
        ref other => panic!("expected ConnectionExhausted, got {other:?}"),
    }
    assert!(err.to_string().contains("imap.example.com:993"));
    assert_eq!(mailbox.journal.borrow().logouts, 0);
}

// ─── Progress, listing, stats and export ────────────────────────────

#[test]
fn test_progress_events_per_folder() {
    let mailbox = FakeMailbox::new()
        .with_messages("A", vec![simple("a@x.com", "1", ""), simple("a@x.com", "2", "")])
        .with_messages("B", Vec::new());
    let events = RefCell::new(Vec::new());
    let record = |e: ProgressEvent<'_>| {
        let line = match e {
            ProgressEvent::FolderStarted { folder, index, total } => {
                format!("start {folder} {index}/{total}")
            }
            ProgressEvent::Message { folder, done, total } => format!("msg {folder} {done}/{total}"),
            ProgressEvent::FolderDone { folder, fetched } => format!("done {folder} {fetched}"),
        };
        events.borrow_mut().push(line);
    };

    harvest(&connector(mailbox), &creds(), &candidates(), Some(&record)).unwrap();

    assert_eq!(
        events.into_inner(),
        vec![
            "start A 0/2",
            "msg A 1/2",
            "msg A 2/2",
            "done A 2",
            "start B 1/2",
            "done B 0",
        ]
    );
}

#[test]
fn test_list_remote_folders_logs_out() {
    let mailbox = FakeMailbox::new()
        .with_messages("Sent", Vec::new())
        .with_messages("INBOX", Vec::new());
    let conn = connector(mailbox.clone());
    let folders = list_remote_folders(&conn, &creds(), &candidates()).unwrap();
    assert_eq!(folders, vec!["INBOX", "Sent"]);
    assert!(mailbox.journal.borrow().examined.is_empty());
    assert_eq!(mailbox.journal.borrow().logouts, 1);
}

#[test]
fn test_harvest_stats_and_export() {
    let mailbox = FakeMailbox::new()
        .with_messages(
            "INBOX",
            vec![
                simple("a@x.com", "1", "Mon, 1 Jul 2024 08:30:00 +0000"),
                simple("c@y.com", "2", "Tue, 2 Jul 2024 08:30:00 +0000"),
                simple("b@x.com", "3", "garbage"),
            ],
        )
        .with_messages("INBOX.Sent", vec![simple("a@x.com", "4", "Wed, 3 Jul 2024 08:30:00 +0000")]);
    let snap = harvest(&connector(mailbox), &creds(), &candidates(), None).unwrap();
    let st = stats::compute(&snap);

    assert_eq!(st.total_emails, 4);
    assert_eq!(st.folder_counts.get("INBOX.Sent"), Some(&1));
    assert_eq!(st.top_senders[0].email, "a@x.com");
    assert_eq!(st.top_senders[0].count, 2);
    assert_eq!(st.top_domains[0].domain, "x.com");
    assert_eq!(st.top_domains[0].count, 3);
    assert_eq!(st.date_range.first.as_deref(), Some("2024-07-01T08:30:00+00:00"));
    assert_eq!(st.date_range.last.as_deref(), Some("2024-07-03T08:30:00+00:00"));

    let dir = tempfile::tempdir().unwrap();
    let written = json::write_snapshot(dir.path(), &snap, &st).unwrap();
    assert_eq!(written.folders.len(), 2);
    assert!(dir.path().join("INBOX_Sent.json").exists());

    let all: Vec<mailharvest::model::record::MessageRecord> =
        serde_json::from_str(&std::fs::read_to_string(&written.all_emails).unwrap()).unwrap();
    assert_eq!(all, snap.messages());
}
