use crate::buffer::BufferPoolManager;
use crate::catalog::{Column, Schema, SchemaRef};
use crate::config::BTreeConfig;
use crate::error::{BrambleError, BrambleResult};
use crate::storage::index::BPlusTreeIndex;
use crate::storage::table_heap::TableHeap;
use crate::utils::table_ref::TableReference;
use std::collections::HashMap;
use std::sync::Arc;

pub type TableOid = u32;
pub type IndexOid = u32;

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: SchemaRef,
    pub table: Arc<TableHeap>,
}

#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub oid: IndexOid,
    pub name: String,
    pub key_schema: SchemaRef,
    pub index: Arc<BPlusTreeIndex>,
    pub table_oid: TableOid,
}

/// Registry of tables and their indexes, giving operators the
/// `GetTable` / `GetTableIndexes` / `GetIndex` surface.
#[derive(Debug)]
pub struct Catalog {
    buffer_pool: Arc<BufferPoolManager>,
    btree_config: BTreeConfig,
    tables: HashMap<TableOid, TableInfo>,
    table_names: HashMap<String, TableOid>,
    indexes: HashMap<IndexOid, IndexInfo>,
    index_names: HashMap<(TableOid, String), IndexOid>,
    next_table_oid: TableOid,
    next_index_oid: IndexOid,
}

impl Catalog {
    pub fn new(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self::new_with_config(buffer_pool, BTreeConfig::default())
    }

    pub fn new_with_config(buffer_pool: Arc<BufferPoolManager>, btree_config: BTreeConfig) -> Self {
        Self {
            buffer_pool,
            btree_config,
            tables: HashMap::new(),
            table_names: HashMap::new(),
            indexes: HashMap::new(),
            index_names: HashMap::new(),
            next_table_oid: 0,
            next_index_oid: 0,
        }
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    /// Create a table whose columns are qualified with the table's name.
    pub fn create_table(
        &mut self,
        name: impl Into<String>,
        schema: Schema,
    ) -> BrambleResult<&TableInfo> {
        let name = name.into();
        if self.table_names.contains_key(&name) {
            return Err(BrambleError::InvalidArgument(format!(
                "table {} already exists",
                name
            )));
        }

        let relation = TableReference::bare(name.clone());
        let qualified = Arc::new(Schema {
            columns: schema
                .columns
                .iter()
                .map(|col| {
                    Arc::new(
                        Column::new(col.name.clone(), col.data_type, col.nullable)
                            .with_relation(Some(relation.clone())),
                    )
                })
                .collect(),
        });

        let table = Arc::new(TableHeap::try_new(
            qualified.clone(),
            self.buffer_pool.clone(),
        )?);
        let oid = self.next_table_oid;
        self.next_table_oid += 1;

        self.tables.insert(
            oid,
            TableInfo {
                oid,
                name: name.clone(),
                schema: qualified,
                table,
            },
        );
        self.table_names.insert(name, oid);
        Ok(&self.tables[&oid])
    }

    /// Create a B+-tree index over `key_columns` of an existing table and
    /// backfill it from the heap.
    pub fn create_index(
        &mut self,
        index_name: impl Into<String>,
        table_name: &str,
        key_columns: &[&str],
    ) -> BrambleResult<&IndexInfo> {
        let index_name = index_name.into();
        let table_info = self.table_by_name(table_name)?.clone();
        if self
            .index_names
            .contains_key(&(table_info.oid, index_name.clone()))
        {
            return Err(BrambleError::InvalidArgument(format!(
                "index {} already exists on table {}",
                index_name, table_name
            )));
        }

        let indices = key_columns
            .iter()
            .map(|col| table_info.schema.index_of(None, col))
            .collect::<BrambleResult<Vec<usize>>>()?;
        let key_schema = Arc::new(table_info.schema.project(&indices)?);

        let index = Arc::new(BPlusTreeIndex::try_new_with_config(
            key_schema.clone(),
            self.buffer_pool.clone(),
            self.btree_config,
        )?);

        // Index whatever the heap already holds.
        let mut iterator = table_info.table.iter();
        while let Some((rid, meta, tuple)) = iterator.next()? {
            if meta.is_deleted {
                continue;
            }
            let key = tuple.project_with_schema(key_schema.clone())?;
            index.insert(&key, rid)?;
        }

        let oid = self.next_index_oid;
        self.next_index_oid += 1;
        self.indexes.insert(
            oid,
            IndexInfo {
                oid,
                name: index_name.clone(),
                key_schema,
                index,
                table_oid: table_info.oid,
            },
        );
        self.index_names.insert((table_info.oid, index_name), oid);
        Ok(&self.indexes[&oid])
    }

    pub fn table(&self, oid: TableOid) -> BrambleResult<&TableInfo> {
        self.tables
            .get(&oid)
            .ok_or_else(|| BrambleError::InvalidArgument(format!("table oid {} not found", oid)))
    }

    pub fn table_by_name(&self, name: &str) -> BrambleResult<&TableInfo> {
        let oid = self
            .table_names
            .get(name)
            .ok_or_else(|| BrambleError::InvalidArgument(format!("table {} not found", name)))?;
        self.table(*oid)
    }

    pub fn table_indexes(&self, table_oid: TableOid) -> Vec<&IndexInfo> {
        let mut infos: Vec<&IndexInfo> = self
            .indexes
            .values()
            .filter(|info| info.table_oid == table_oid)
            .collect();
        infos.sort_by_key(|info| info.oid);
        infos
    }

    pub fn index(&self, oid: IndexOid) -> BrambleResult<&IndexInfo> {
        self.indexes
            .get(&oid)
            .ok_or_else(|| BrambleError::InvalidArgument(format!("index oid {} not found", oid)))
    }

    pub fn index_by_name(&self, name: &str, table_oid: TableOid) -> BrambleResult<&IndexInfo> {
        let oid = self
            .index_names
            .get(&(table_oid, name.to_string()))
            .ok_or_else(|| {
                BrambleError::InvalidArgument(format!(
                    "index {} not found on table oid {}",
                    name, table_oid
                ))
            })?;
        self.index(*oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::storage::disk_manager::DiskManager;
    use crate::storage::disk_scheduler::DiskScheduler;
    use crate::storage::page::EMPTY_TUPLE_META;
    use crate::storage::tuple::Tuple;
    use tempfile::TempDir;

    fn setup_catalog() -> (TempDir, Catalog) {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
        let disk_scheduler = Arc::new(DiskScheduler::new(disk_manager));
        let buffer_pool = Arc::new(BufferPoolManager::new(64, disk_scheduler));
        (temp_dir, Catalog::new(buffer_pool))
    }

    #[test]
    fn create_and_look_up_table() {
        let (_tmp, mut catalog) = setup_catalog();
        let schema = Schema::new(vec![
            Column::new("id", DataType::Int32, false),
            Column::new("name", DataType::Varchar(None), true),
        ]);
        let oid = catalog.create_table("users", schema).unwrap().oid;

        assert_eq!(catalog.table(oid).unwrap().name, "users");
        assert_eq!(catalog.table_by_name("users").unwrap().oid, oid);
        assert!(catalog.table_by_name("missing").is_err());
        assert!(catalog
            .create_table("users", Schema::new(vec![]))
            .is_err());
    }

    #[test]
    fn create_index_backfills_existing_rows() {
        let (_tmp, mut catalog) = setup_catalog();
        let schema = Schema::new(vec![Column::new("id", DataType::Int32, false)]);
        let table_info = catalog.create_table("t", schema).unwrap().clone();

        for i in 0..10i32 {
            let tuple = Tuple::new(table_info.schema.clone(), vec![i.into()]);
            table_info
                .table
                .insert_tuple(&EMPTY_TUPLE_META, &tuple)
                .unwrap();
        }

        let index_info = catalog.create_index("t_id_idx", "t", &["id"]).unwrap();
        let key = Tuple::new(index_info.key_schema.clone(), vec![7i32.into()]);
        assert!(index_info.index.get(&key).unwrap().is_some());

        assert_eq!(catalog.table_indexes(table_info.oid).len(), 1);
        assert!(catalog.index_by_name("t_id_idx", table_info.oid).is_ok());
    }
}
