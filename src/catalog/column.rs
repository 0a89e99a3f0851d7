use crate::catalog::DataType;
use crate::utils::scalar::ScalarValue;
use crate::utils::table_ref::TableReference;
use std::sync::Arc;

pub type ColumnRef = Arc<Column>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub relation: Option<TableReference>,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default: ScalarValue,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            relation: None,
            name: name.into(),
            data_type,
            nullable,
            default: ScalarValue::new_empty(data_type),
        }
    }

    pub fn with_relation(mut self, relation: Option<TableReference>) -> Self {
        self.relation = relation;
        self
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(relation) = self.relation.as_ref() {
            write!(f, "{}.", relation)?;
        }
        write!(f, "{} {}", self.name, self.data_type)
    }
}
