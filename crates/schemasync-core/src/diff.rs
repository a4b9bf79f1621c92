use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of schema difference reported by the comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    TableAdded,
    TableRemoved,
    ColumnAdded,
    ColumnRemoved,
    ColumnModified,
    IndexAdded,
    IndexRemoved,
    IndexModified,
    ForeignKeyAdded,
    ForeignKeyRemoved,
    ForeignKeyModified,
    UniqueConstraintAdded,
    UniqueConstraintRemoved,
    UniqueConstraintModified,
}

impl DiffKind {
    /// Short label used when listing differences.
    pub fn label(&self) -> &'static str {
        match self {
            DiffKind::TableAdded => "table added",
            DiffKind::TableRemoved => "table removed",
            DiffKind::ColumnAdded => "column added",
            DiffKind::ColumnRemoved => "column removed",
            DiffKind::ColumnModified => "column modified",
            DiffKind::IndexAdded => "index added",
            DiffKind::IndexRemoved => "index removed",
            DiffKind::IndexModified => "index modified",
            DiffKind::ForeignKeyAdded => "foreign key added",
            DiffKind::ForeignKeyRemoved => "foreign key removed",
            DiffKind::ForeignKeyModified => "foreign key modified",
            DiffKind::UniqueConstraintAdded => "unique constraint added",
            DiffKind::UniqueConstraintRemoved => "unique constraint removed",
            DiffKind::UniqueConstraintModified => "unique constraint modified",
        }
    }
}

/// One detected difference with the SQL that resolves it on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiffItem {
    /// Identifier, unique within one `DiffResult`.
    pub id: String,
    #[serde(rename = "diff_type")]
    pub kind: DiffKind,
    pub table_name: String,
    /// Column, index or constraint name when the difference is below table level.
    pub object_name: Option<String>,
    pub source_def: Option<String>,
    pub target_def: Option<String>,
    pub sql: String,
    /// Comparator's suggestion only; the orchestrator owns the real selection.
    #[serde(default)]
    pub selected: bool,
}

/// Output of one schema comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiffResult {
    pub items: Vec<DiffItem>,
    pub source_tables: usize,
    pub target_tables: usize,
}

/// Items of a result that belong to one table, in result order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableGroup<'a> {
    pub table_name: &'a str,
    pub items: Vec<&'a DiffItem>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&DiffItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Group items by table, ordered by each table's first appearance.
    pub fn groups(&self) -> Vec<TableGroup<'_>> {
        let mut groups: Vec<TableGroup<'_>> = Vec::new();
        for item in &self.items {
            match groups
                .iter_mut()
                .find(|group| group.table_name == item.table_name)
            {
                Some(group) => group.items.push(item),
                None => groups.push(TableGroup {
                    table_name: &item.table_name,
                    items: vec![item],
                }),
            }
        }
        groups
    }

    /// Items of a single table, in result order.
    pub fn table_items<'a>(&'a self, table_name: &'a str) -> impl Iterator<Item = &'a DiffItem> {
        self.items
            .iter()
            .filter(move |item| item.table_name == table_name)
    }
}
