/// A bare reference to a table by name. Column qualification and join schemas
/// use it to tell apart same-named columns from different relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableReference {
    pub table: String,
}

impl TableReference {
    pub fn bare(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table)
    }
}
