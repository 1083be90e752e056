// Medsync - Core Library
// Shared by the terminal browser, the API server and the tests

pub mod error;
pub mod normalize;
pub mod locale;
pub mod store;
pub mod medicine;
pub mod search;
pub mod shortlist;
pub mod subscription;
pub mod card;
pub mod inventory;
pub mod db;
pub mod importer;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{Result, ShortlistError, StoreError, SubscriptionError};
pub use normalize::{normalize_date, normalize_price, normalize_stock, RawField, EMPTY_SENTINEL};
pub use locale::{translate, Label, Language, LanguageContext};
pub use store::{Document, DocumentStore, ListenerRegistration, MemoryStore, StoreEvent};
pub use medicine::{classify, Category, Collection, DrugRecord, Medicine, ProductRecord};
pub use search::filter_medicines;
pub use shortlist::{Shortlist, ShortlistEntry};
pub use subscription::{CollectionState, CollectionSubscription, Phase};
pub use card::{CardRow, MedicineCard};
pub use inventory::{add_to_shortlist, render_tab, Catalog, CatalogHook, Session, Tab, TabView};
pub use db::{open_database, setup_database, upsert_documents, SqliteStore};
pub use importer::{import_csv, import_reader, ImportReport};
pub use config::{init_file_logging, init_logging, Cli, Command, Config, ServerCli};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
