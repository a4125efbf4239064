//! Persist a harvest as JSON documents.
//!
//! One run writes, into a single output directory:
//! - `folder_list.json`: every folder name, empty folders included
//! - `<folder>.json`: the records of each non-empty folder
//! - `all_emails.json`: every record, folder after folder
//! - `stats.json`: the aggregate [`Stats`]
//!
//! Existing files from a previous run are overwritten.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::model::snapshot::MailboxSnapshot;
use crate::stats::Stats;

pub const FOLDER_LIST_FILE: &str = "folder_list.json";
pub const ALL_EMAILS_FILE: &str = "all_emails.json";
pub const STATS_FILE: &str = "stats.json";

/// Paths of the documents written by [`write_snapshot`].
#[derive(Debug, Clone, Default)]
pub struct WrittenFiles {
    pub folder_list: PathBuf,
    /// `(folder, path)` for each non-empty folder.
    pub folders: Vec<(String, PathBuf)>,
    pub all_emails: PathBuf,
    pub stats: PathBuf,
}

/// Write every document for `snapshot` into `dir`, creating it if needed.
pub fn write_snapshot(
    dir: &Path,
    snapshot: &MailboxSnapshot,
    stats: &Stats,
) -> anyhow::Result<WrittenFiles> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let folder_list = dir.join(FOLDER_LIST_FILE);
    write_json(&folder_list, &snapshot.folders())?;

    // Reserved names keep a folder called "stats" from clobbering stats.json.
    let mut used: HashSet<String> = [FOLDER_LIST_FILE, ALL_EMAILS_FILE, STATS_FILE]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut folders = Vec::new();
    for (folder, records) in snapshot.iter_folders() {
        if records.is_empty() {
            continue;
        }
        let name = unique_name(&safe_filename(folder), &mut used);
        let path = dir.join(&name);
        write_json(&path, &records)?;
        tracing::debug!(folder = %folder, path = %path.display(), count = records.len(), "Wrote folder");
        folders.push((folder.clone(), path));
    }

    let all_emails = dir.join(ALL_EMAILS_FILE);
    write_json(&all_emails, &snapshot.messages())?;

    let stats_path = dir.join(STATS_FILE);
    write_json(&stats_path, stats)?;

    tracing::info!(
        dir = %dir.display(),
        folders = folders.len(),
        messages = snapshot.messages().len(),
        "Export complete"
    );

    Ok(WrittenFiles {
        folder_list,
        folders,
        all_emails,
        stats: stats_path,
    })
}

/// Turn a folder name into a file stem: `/`, `\`, space and `.` become `_`;
/// double quotes are dropped.
pub fn safe_filename(folder: &str) -> String {
    folder
        .chars()
        .filter(|&c| c != '"')
        .map(|c| match c {
            '/' | '\\' | ' ' | '.' => '_',
            other => other,
        })
        .collect()
}

/// `<stem>.json`, or `<stem>_<n>.json` if an earlier folder already took it.
fn unique_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut name = format!("{stem}.json");
    let mut n = 2;
    while used.contains(&name) {
        name = format!("{stem}_{n}.json");
        n += 1;
    }
    used.insert(name.clone());
    name
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("writing {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::MessageRecord;
    use crate::model::snapshot::SnapshotBuilder;
    use crate::stats;

    fn record(folder: &str, from: &str) -> MessageRecord {
        MessageRecord {
            folder: folder.into(),
            from_email: from.into(),
            subject: format!("from {from}"),
            ..Default::default()
        }
    }

    fn read_json(path: &Path) -> serde_json::Value {
        let text = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("INBOX"), "INBOX");
        assert_eq!(safe_filename("INBOX.Sent Items"), "INBOX_Sent_Items");
        assert_eq!(safe_filename("a/b\\c"), "a_b_c");
        assert_eq!(safe_filename("\"Quoted\""), "Quoted");
    }

    #[test]
    fn test_unique_name_avoids_collisions() {
        let mut used = HashSet::new();
        used.insert(STATS_FILE.to_string());
        assert_eq!(unique_name("stats", &mut used), "stats_2.json");
        assert_eq!(unique_name("A_B", &mut used), "A_B.json");
        assert_eq!(unique_name("A_B", &mut used), "A_B_2.json");
        assert_eq!(unique_name("A_B", &mut used), "A_B_3.json");
    }

    #[test]
    fn test_write_snapshot_documents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let mut b = SnapshotBuilder::new();
        b.push_folder("Empty".into(), Vec::new());
        b.push_folder(
            "INBOX".into(),
            vec![record("INBOX", "a@x.com"), record("INBOX", "b@y.com")],
        );
        b.push_folder("INBOX.Sent".into(), vec![record("INBOX.Sent", "me@x.com")]);
        let snap = b.finish();
        let st = stats::compute(&snap);

        let written = write_snapshot(&out, &snap, &st).unwrap();

        let list = read_json(&written.folder_list);
        assert_eq!(list, serde_json::json!(["Empty", "INBOX", "INBOX.Sent"]));

        // No file for the empty folder
        assert!(!out.join("Empty.json").exists());
        assert_eq!(written.folders.len(), 2);
        assert_eq!(written.folders[1].1, out.join("INBOX_Sent.json"));

        let inbox = read_json(&out.join("INBOX.json"));
        assert_eq!(inbox.as_array().unwrap().len(), 2);
        assert_eq!(inbox[0]["from_email"], "a@x.com");
        assert_eq!(inbox[0]["folder"], "INBOX");

        let all = read_json(&written.all_emails);
        assert_eq!(all.as_array().unwrap().len(), 3);
        assert_eq!(all[2]["folder"], "INBOX.Sent");

        let stats_doc = read_json(&written.stats);
        assert_eq!(stats_doc["total_emails"], 3);
        assert_eq!(stats_doc["folder_counts"]["Empty"], 0);
        assert_eq!(stats_doc["top_domains"][0]["domain"], "x.com");
        assert_eq!(stats_doc["top_domains"][0]["count"], 2);
    }

    #[test]
    fn test_folder_named_stats_does_not_clobber_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = SnapshotBuilder::new();
        b.push_folder("stats".into(), vec![record("stats", "a@x.com")]);
        let snap = b.finish();
        let st = stats::compute(&snap);

        let written = write_snapshot(dir.path(), &snap, &st).unwrap();
        assert_eq!(written.folders[0].1, dir.path().join("stats_2.json"));
        assert_eq!(read_json(&written.stats)["total_emails"], 1);
    }

    #[test]
    fn test_empty_snapshot_still_writes_summary_documents() {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotBuilder::new().finish();
        let st = stats::compute(&snap);
        let written = write_snapshot(dir.path(), &snap, &st).unwrap();
        assert_eq!(read_json(&written.folder_list), serde_json::json!([]));
        assert_eq!(read_json(&written.all_emails), serde_json::json!([]));
        assert!(written.folders.is_empty());
        assert!(written.stats.exists());
    }
}
