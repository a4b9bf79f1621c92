//! Plain-text views printed by the CLI.

use schemasync_core::{Connection, DiffItem, GroupState, Selection};
use schemasync_sync::GroupView;

pub fn render_connections(connections: &[Connection]) -> String {
    if connections.is_empty() {
        return "no saved connections".to_string();
    }
    let mut lines = Vec::new();
    for connection in connections {
        let database = connection.bound_database().unwrap_or("(choose at compare time)");
        lines.push(format!(
            "{:<16} {:<11} {}  {}@{}:{}/{}",
            connection.id,
            connection.dialect.name(),
            connection.name,
            connection.credentials.username,
            connection.host,
            connection.port,
            database
        ));
    }
    lines.join("\n")
}

/// One block per table: a tri-state header, then one line per item.
pub fn render_groups(groups: &[GroupView], selection: &Selection) -> String {
    if groups.is_empty() {
        return "schemas are in sync".to_string();
    }

    let mut lines = Vec::new();
    for group in groups {
        lines.push(format!("{} {}", group_marker(group.state), group.table_name));
        for item in &group.items {
            lines.push(format!(
                "  {} {}",
                item_marker(selection.contains(&item.id)),
                describe_item(item)
            ));
        }
    }
    let items: usize = groups.iter().map(|group| group.items.len()).sum();
    lines.push(String::new());
    lines.push(format!(
        "{items} difference(s) in {} table(s), {} selected",
        groups.len(),
        selection.len()
    ));
    lines.join("\n")
}

fn group_marker(state: GroupState) -> &'static str {
    match state {
        GroupState::Unchecked => "[ ]",
        GroupState::Indeterminate => "[-]",
        GroupState::Checked => "[x]",
    }
}

fn item_marker(selected: bool) -> &'static str {
    if selected { "[x]" } else { "[ ]" }
}

fn describe_item(item: &DiffItem) -> String {
    match &item.object_name {
        Some(object) => format!("{}  {}  {}", item.id, item.kind.label(), object),
        None => format!("{}  {}", item.id, item.kind.label()),
    }
}
