// End-to-end: CSV export → SQLite store → live catalog → tabs and shortlist.

use medsync::db::{delete_document, open_database};
use medsync::{
    import_reader, Catalog, Collection, CollectionState, Config, Language, MemoryStore, Phase,
    Session, SqliteStore, SubscriptionError, Tab, TabView,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const PRODUCTS_CSV: &str = "\
SHREE MEDICALS,,,,
Stock Report,,,,
Product Name,Product Name_kn,Current Stock,M.R.P.,EXP
DOLO 650,ಡೋಲೊ 650,40,30.50,01-May-27
CROCIN 1/2,ಕ್ರೋಸಿನ್,0,18,2027-03-15
";

const PMBI_CSV: &str = "\
Drug Code,Drug Name,UOM,Batch No,MRP,Expiry Date,Qty
1042,Paracetamol 500mg,10's,B12,12.5,31/12/2026,150
";

fn ids(view: &TabView) -> Vec<String> {
    match view {
        TabView::List(cards) => cards.iter().map(|c| c.id.clone()).collect(),
        other => panic!("expected a list, got {:?}", other),
    }
}

fn seeded_sqlite(dir: &tempfile::TempDir) -> (SqliteStore, Config) {
    let config = Config {
        db_path: dir.path().join("inventory.db"),
        ..Config::default()
    };
    let store = SqliteStore::open(&config.db_path).unwrap();

    let products = import_reader(PRODUCTS_CSV.as_bytes(), Collection::Products).unwrap();
    store
        .upsert(config.collection_name(Collection::Products), &products.documents)
        .unwrap();
    let drugs = import_reader(PMBI_CSV.as_bytes(), Collection::JanAushadhi).unwrap();
    store
        .upsert(config.collection_name(Collection::JanAushadhi), &drugs.documents)
        .unwrap();

    (store, config)
}

#[test]
fn test_imported_export_is_browsable() {
    let dir = tempfile::tempdir().unwrap();
    let (store, config) = seeded_sqlite(&dir);

    let mut catalog = Catalog::new(Some(Arc::new(store.clone())), &config);
    catalog.start();
    assert_eq!(catalog.phase(Collection::Products), Phase::Ready);

    let session = Session::new(Language::English);
    let products = session.view(&catalog, Tab::Products);
    assert_eq!(ids(&products), vec!["CROCIN 1-2", "DOLO 650"]);

    let TabView::List(cards) = products else {
        unreachable!()
    };
    let dolo = &cards[1];
    assert_eq!(dolo.row("Stock"), Some("40"));
    assert_eq!(dolo.row("MRP"), Some("Rs 30.50"));
    assert!(dolo.can_add());
    assert!(cards[0].out_of_stock);

    let drugs = session.view(&catalog, Tab::JanAushadhi);
    let TabView::List(cards) = drugs else {
        panic!("expected a list")
    };
    assert_eq!(cards[0].row("Quantity"), Some("150"));
    assert_eq!(cards[0].row("UOM"), Some("10's"));
    assert_eq!(cards[0].subtitle, "Jan Aushadhi - 1042");
}

#[test]
fn test_writes_from_another_connection_arrive_on_poll() {
    let dir = tempfile::tempdir().unwrap();
    let (store, config) = seeded_sqlite(&dir);

    let mut catalog = Catalog::new(Some(Arc::new(store.clone())), &config);
    catalog.start();
    let mut session = Session::default();
    assert_eq!(session.add(&catalog, Collection::Products, "DOLO 650"), Ok(true));

    // an import run in another process
    let other = SqliteStore::open(&config.db_path).unwrap();
    let more = import_reader(
        "Product Name,Product Name_kn,Current Stock\nAZEE 500,ಅಜೀ 500,7\n".as_bytes(),
        Collection::Products,
    )
    .unwrap();
    other.upsert("medicine-1", &more.documents).unwrap();
    let conn = open_database(&config.db_path).unwrap();
    assert!(delete_document(&conn, "medicine-1", "DOLO 650").unwrap());

    // nothing moves until the store is polled
    assert_eq!(catalog.records(Collection::Products).unwrap().len(), 2);
    assert!(store.poll() >= 1);
    assert_eq!(
        ids(&session.view(&catalog, Tab::Products)),
        vec!["AZEE 500", "CROCIN 1-2"]
    );

    // the shortlist keeps its copy of the deleted record
    assert_eq!(ids(&session.view(&catalog, Tab::MyMedicines)), vec!["DOLO 650"]);

    catalog.stop();
    assert_eq!(store.watch_count(), 0);
}

#[test]
fn test_empty_collection_settles_ready() {
    let store = Arc::new(MemoryStore::new());
    let mut catalog = Catalog::new(Some(store), &Config::default());
    catalog.start();

    assert_eq!(
        catalog.state(Collection::JanAushadhi),
        CollectionState {
            data: Some(vec![]),
            loading: false,
            error: None,
        }
    );
    assert_eq!(
        Session::default().view(&catalog, Tab::JanAushadhi),
        TabView::List(vec![])
    );
}

#[test]
fn test_failure_then_retry() {
    let store = Arc::new(MemoryStore::new());
    store.set_document(
        "medicine-1",
        "dolo",
        json!({"Product Name": "Dolo 650", "Product Name_kn": "ಡೋಲೊ 650", "Current Stock": 3}),
    );
    let mut catalog = Catalog::new(Some(store.clone()), &Config::default());
    catalog.start();

    let mut session = Session::default();
    assert_eq!(session.add(&catalog, Collection::Products, "dolo"), Ok(true));

    let denied = SubscriptionError::PermissionDenied("medicine-1".to_string());
    store.fail("medicine-1", denied.clone());

    assert_eq!(session.view(&catalog, Tab::Products), TabView::Failed(denied.clone()));
    assert_eq!(session.view(&catalog, Tab::JanAushadhi), TabView::Failed(denied));
    assert_eq!(ids(&session.view(&catalog, Tab::MyMedicines)), vec!["dolo"]);

    catalog.retry();
    assert_eq!(ids(&session.view(&catalog, Tab::Products)), vec!["dolo"]);
}

#[test]
fn test_kannada_labels_on_cards() {
    let store = Arc::new(MemoryStore::new());
    store.set_document(
        "medicine-1",
        "dolo",
        json!({"Product Name": "Dolo 650", "Product Name_kn": "ಡೋಲೊ 650", "Current Stock": 0}),
    );
    let mut catalog = Catalog::new(Some(store), &Config::default());
    catalog.start();

    let session = Session::new(Language::Kannada);
    let TabView::List(cards) = session.view(&catalog, Tab::Products) else {
        panic!("expected a list")
    };
    assert_eq!(cards[0].title, "ಡೋಲೊ 650");
    assert_eq!(cards[0].badge.as_deref(), Some("ದಾಸ್ತಾನು ಇಲ್ಲ"));
    assert!(!cards[0].can_add());
}
