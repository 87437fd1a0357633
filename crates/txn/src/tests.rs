use super::*;
use common::Row;
use tempfile::tempdir;
use types::{SqlType, Value};

fn new_pool() -> (tempfile::TempDir, BufferPool) {
    let dir = tempdir().unwrap();
    let (pool, _) = BufferPool::open(&dir.path().join("teaching.db"), 16).unwrap();
    (dir, pool)
}

fn int_table(name: &str) -> Table {
    Table::new(name.to_string(), vec!["id".into()], vec![SqlType::Int])
}

#[test]
fn create_table_is_invisible_until_commit() {
    let (_dir, _pool) = new_pool();
    let mut catalog = Catalog::empty();
    let mut txn = Transaction::new(1);

    txn.create_table(&catalog, int_table("t")).unwrap();
    assert!(!catalog.has_table("t"));
    assert!(txn.resolve_table(&catalog, "t").is_ok());

    txn.commit(&mut catalog).unwrap();
    assert!(catalog.has_table("t"));
}

#[test]
fn copy_on_write_reads_the_original_and_redirects_the_shadow_table() {
    let (_dir, mut pool) = new_pool();
    let mut catalog = Catalog::empty();

    let original_id = catalog.get_free_page_id(0);
    let rows = vec![Row::new(vec![Value::Int(1)])];
    pool.put(Page {
        page_id: original_id,
        payload: storage::encode_rows(&rows).unwrap(),
    })
    .unwrap();

    let mut table = int_table("t");
    table.page_ids.push(original_id);
    catalog.add_new_table(table).unwrap();
    catalog.clear_borrowed(0);

    let mut txn = Transaction::new(1);
    let (shadow_id, decoded) = txn.page_for_write(&mut catalog, &mut pool, "t", 0).unwrap();

    assert_ne!(shadow_id, original_id);
    assert_eq!(decoded, rows);
    assert_eq!(
        txn.resolve_table(&catalog, "t").unwrap().page_ids,
        vec![shadow_id]
    );
    // the live catalog entry is untouched until commit
    assert_eq!(catalog.get_table_by_name("t").unwrap().page_ids, vec![original_id]);
}

#[test]
fn repeated_write_to_the_same_page_does_not_copy_twice() {
    let (_dir, mut pool) = new_pool();
    let mut catalog = Catalog::empty();
    let original_id = catalog.get_free_page_id(0);
    pool.put(Page::empty(original_id)).unwrap();
    let mut table = int_table("t");
    table.page_ids.push(original_id);
    catalog.add_new_table(table).unwrap();
    catalog.clear_borrowed(0);

    let mut txn = Transaction::new(1);
    let (first_id, _) = txn.page_for_write(&mut catalog, &mut pool, "t", 0).unwrap();
    let (second_id, _) = txn.page_for_write(&mut catalog, &mut pool, "t", 0).unwrap();
    assert_eq!(first_id, second_id);
}

#[test]
fn commit_realizes_shadow_tables_and_frees_preimages() {
    let (_dir, mut pool) = new_pool();
    let mut catalog = Catalog::empty();
    let original_id = catalog.get_free_page_id(0);
    pool.put(Page::empty(original_id)).unwrap();
    let mut table = int_table("t");
    table.page_ids.push(original_id);
    catalog.add_new_table(table).unwrap();
    catalog.clear_borrowed(0);

    let mut txn = Transaction::new(1);
    let (shadow_id, _) = txn.page_for_write(&mut catalog, &mut pool, "t", 0).unwrap();
    txn.commit(&mut catalog).unwrap();

    assert_eq!(catalog.get_table_by_name("t").unwrap().page_ids, vec![shadow_id]);
    assert_eq!(catalog.free_page_ids().collect::<Vec<_>>(), vec![original_id]);
    assert_eq!(catalog.borrowed_page_ids(1), &[]);
}

#[test]
fn rollback_discards_shadow_state_and_frees_allocations() {
    let (_dir, mut pool) = new_pool();
    let mut catalog = Catalog::empty();
    let original_id = catalog.get_free_page_id(0);
    pool.put(Page::empty(original_id)).unwrap();
    let mut table = int_table("t");
    table.page_ids.push(original_id);
    catalog.add_new_table(table).unwrap();
    catalog.clear_borrowed(0);

    let mut txn = Transaction::new(1);
    txn.page_for_write(&mut catalog, &mut pool, "t", 0).unwrap();
    txn.rollback(&mut catalog);

    // the original page id is the one still referenced by the live table,
    // so only the shadow allocation should have come back.
    assert_eq!(catalog.get_table_by_name("t").unwrap().page_ids, vec![original_id]);
    assert_eq!(catalog.borrowed_page_ids(1), &[]);
    assert_eq!(catalog.free_page_ids().count(), 1);
}

#[test]
fn allocate_page_appends_to_the_shadow_tables_page_list() {
    let (_dir, mut pool) = new_pool();
    let mut catalog = Catalog::empty();
    catalog.add_new_table(int_table("t")).unwrap();

    let mut txn = Transaction::new(1);
    let id = txn.allocate_page(&mut catalog, &mut pool, "t").unwrap();

    assert_eq!(txn.resolve_table(&catalog, "t").unwrap().page_ids, vec![id]);
    assert!(txn.owns_page(id));
}

#[test]
fn drop_table_tombstones_and_hides_the_table_until_commit() {
    let (_dir, _pool) = new_pool();
    let mut catalog = Catalog::empty();
    catalog.add_new_table(int_table("t")).unwrap();

    let mut txn = Transaction::new(1);
    txn.drop_table(&catalog, "t").unwrap();
    assert!(txn.resolve_table(&catalog, "t").is_err());
    assert!(catalog.has_table("t"));

    txn.commit(&mut catalog).unwrap();
    assert!(!catalog.has_table("t"));
}

#[test]
fn delete_rows_removes_listed_indices_regardless_of_order() {
    let mut rows = vec![
        Row::new(vec![Value::Int(0)]),
        Row::new(vec![Value::Int(1)]),
        Row::new(vec![Value::Int(2)]),
    ];
    delete_rows(&mut rows, vec![2, 0]);
    assert_eq!(rows, vec![Row::new(vec![Value::Int(1)])]);
}
