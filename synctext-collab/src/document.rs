//! Document file access and the console view.
//!
//! The document is one plain-text file per participant, read in full
//! and rewritten in full on every merge. Rewrites go through a
//! temporary sibling path and a rename so a crash mid-write leaves the
//! previous complete document in place; the contract stays "the last
//! complete write wins".

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Contents seeded into a participant's document when it is absent at
/// startup.
pub const INITIAL_DOCUMENT: [&str; 4] = [
    "Hello World",
    "This is a collaborative editor",
    "Welcome to SyncText",
    "Edit this document and see real-time updates",
];

/// Read the whole document as lines.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw.lines().map(str::to_string).collect())
}

/// Rewrite the whole document, newline-terminated, via temp + rename.
pub fn write_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, out)?;
    fs::rename(&tmp, path)
}

/// Seed the welcome document when the file does not exist yet. Returns
/// whether seeding happened.
pub fn seed_if_missing(path: &Path) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let lines: Vec<String> = INITIAL_DOCUMENT.iter().map(|s| s.to_string()).collect();
    write_lines(path, &lines)?;
    Ok(true)
}

/// Last modification time, used by the polling change detector.
pub fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Where redisplayed documents go. The session calls this after every
/// detected change and every merge commit; rendering stays outside the
/// engine.
pub trait DocumentView: Send + Sync {
    fn render(&self, path: &Path, lines: &[String], last_update: &str, notifications: &[String]);
}

/// Plain console rendering: numbered lines plus the recent-notification
/// pane.
pub struct ConsoleView;

impl DocumentView for ConsoleView {
    fn render(&self, path: &Path, lines: &[String], last_update: &str, notifications: &[String]) {
        println!("Document: {}", path.display());
        println!("Last updated: {last_update}");
        println!("----------------------------------------");
        for (i, line) in lines.iter().enumerate() {
            println!("Line {i}: {line}");
        }
        println!("----------------------------------------");
        if !notifications.is_empty() {
            println!();
            println!("--- Recent notifications ---");
            for n in notifications {
                println!("{n}");
            }
            println!("-----------------------------");
        }
        println!("Monitoring for changes...");
    }
}

/// Discards all rendering. For headless sessions and tests.
pub struct NullView;

impl DocumentView for NullView {
    fn render(&self, _: &Path, _: &[String], _: &str, _: &[String]) {}
}
