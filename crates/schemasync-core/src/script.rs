//! Assembly of executable synchronization scripts.
//!
//! The output is byte-stable for a given set of inputs: the generation time is
//! passed in rather than read, and section separators are fixed.

use chrono::NaiveDateTime;

use crate::connection::{ConnectionDescriptor, Dialect};
use crate::diff::DiffItem;

/// Version stamped into script headers.
pub const SCRIPT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Banner line framing the header and footer.
pub const BANNER: &str = "-- ---------------------------------------------------------";

/// Last line of every non-empty script.
pub const END_MARKER: &str = "-- End of synchronization script";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MYSQL_PREAMBLE: &[&str] = &[
    "/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;",
    "/*!40101 SET @OLD_COLLATION_CONNECTION=@@COLLATION_CONNECTION */;",
    "/*!40101 SET NAMES utf8mb4 */;",
    "/*!40014 SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0 */;",
    "/*!40101 SET @OLD_SQL_MODE=@@SQL_MODE, SQL_MODE='NO_AUTO_VALUE_ON_ZERO' */;",
];

const MYSQL_POSTAMBLE: &[&str] = &[
    "/*!40101 SET SQL_MODE=@OLD_SQL_MODE */;",
    "/*!40014 SET FOREIGN_KEY_CHECKS=@OLD_FOREIGN_KEY_CHECKS */;",
    "/*!40101 SET COLLATION_CONNECTION=@OLD_COLLATION_CONNECTION */;",
    "/*!40101 SET CHARACTER_SET_CLIENT=@OLD_CHARACTER_SET_CLIENT */;",
];

const POSTGRES_PREAMBLE: &[&str] = &[
    "SET statement_timeout = 0;",
    "SET lock_timeout = 0;",
    "SET client_encoding = 'UTF8';",
];

/// Source of the generation timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Pick the script dialect: target first, then source.
pub fn resolve_dialect(target: Option<Dialect>, source: Option<Dialect>) -> Option<Dialect> {
    target.or(source)
}

/// Build the full script for the selected items.
///
/// `items` must already be in result order. Items with blank SQL are left
/// out of both the body and the change count, and an empty string is
/// returned when no executable fragment remains. A `None` dialect renders as
/// `Unknown` and gets the PostgreSQL-style preamble.
pub fn assemble(
    dialect: Option<Dialect>,
    source: Option<&ConnectionDescriptor>,
    target: Option<&ConnectionDescriptor>,
    items: &[&DiffItem],
    generated_at: NaiveDateTime,
) -> String {
    let fragments: Vec<&str> = items
        .iter()
        .map(|item| item.sql.trim())
        .filter(|sql| !sql.is_empty())
        .collect();
    if fragments.is_empty() {
        return String::new();
    }

    let mysql_family = dialect.is_some_and(|dialect| dialect.is_mysql_family());
    let mut sections = Vec::with_capacity(4);

    sections.push(render_header(dialect, source, target, fragments.len(), generated_at));
    sections.push(if mysql_family {
        MYSQL_PREAMBLE.join("\n")
    } else {
        POSTGRES_PREAMBLE.join("\n")
    });

    sections.push(fragments.join("\n\n"));

    if mysql_family {
        sections.push(MYSQL_POSTAMBLE.join("\n"));
    }
    sections.push(format!("{BANNER}\n{END_MARKER}"));

    sections.join("\n\n")
}

fn render_header(
    dialect: Option<Dialect>,
    source: Option<&ConnectionDescriptor>,
    target: Option<&ConnectionDescriptor>,
    count: usize,
    generated_at: NaiveDateTime,
) -> String {
    let describe = |descriptor: Option<&ConnectionDescriptor>| {
        descriptor
            .map(ToString::to_string)
            .unwrap_or_else(|| "N/A".to_string())
    };

    [
        BANNER.to_string(),
        format!("-- Database Structure Sync v{SCRIPT_VERSION}"),
        format!("-- Generated:       {}", generated_at.format(TIMESTAMP_FORMAT)),
        format!(
            "-- Dialect:         {}",
            dialect.map(|dialect| dialect.name()).unwrap_or("Unknown")
        ),
        format!("-- Source:          {}", describe(source)),
        format!("-- Target:          {}", describe(target)),
        format!("-- Changes:         {count} item(s)"),
        BANNER.to_string(),
    ]
    .join("\n")
}

/// Inputs that determine the assembled text, minus the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptKey {
    pub dialect: Option<Dialect>,
    pub source: Option<ConnectionDescriptor>,
    pub target: Option<ConnectionDescriptor>,
    /// Bumped every time a new result is stored, so equal ids from different
    /// comparisons never share cached text.
    pub result_revision: u64,
    pub item_ids: Vec<String>,
}

/// Single-entry memo for [`assemble`].
#[derive(Debug, Default)]
pub struct ScriptCache {
    entry: Option<(ScriptKey, String)>,
}

impl ScriptCache {
    /// Return cached text for `key`, assembling only when the key changed.
    pub fn get_or_assemble(&mut self, key: ScriptKey, items: &[&DiffItem], clock: &dyn Clock) -> String {
        if let Some((cached_key, text)) = &self.entry {
            if *cached_key == key {
                return text.clone();
            }
        }

        let text = assemble(
            key.dialect,
            key.source.as_ref(),
            key.target.as_ref(),
            items,
            clock.now(),
        );
        self.entry = Some((key, text.clone()));
        text
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
