// Inventory - Page-level view model
// Catalog owns the two live collection subscriptions and can be shared by
// several viewers. Session is one viewer's state: active tab, the three
// search boxes, the shortlist and the display language. render_tab combines
// both into what a tab shows.

use crate::card::MedicineCard;
use crate::config::Config;
use crate::error::{ShortlistError, SubscriptionError};
use crate::locale::{Label, Language, LanguageContext};
use crate::medicine::{Collection, Medicine};
use crate::search::filter_medicines;
use crate::shortlist::Shortlist;
use crate::store::DocumentStore;
use crate::subscription::{CollectionState, CollectionSubscription, Phase};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// TABS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tab {
    #[default]
    Products,
    JanAushadhi,
    MyMedicines,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Products, Tab::JanAushadhi, Tab::MyMedicines];

    pub fn next(&self) -> Self {
        match self {
            Tab::Products => Tab::JanAushadhi,
            Tab::JanAushadhi => Tab::MyMedicines,
            Tab::MyMedicines => Tab::Products,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Tab::Products => Tab::MyMedicines,
            Tab::JanAushadhi => Tab::Products,
            Tab::MyMedicines => Tab::JanAushadhi,
        }
    }

    pub fn title(&self) -> Label {
        match self {
            Tab::Products => Label::ProductsTab,
            Tab::JanAushadhi => Label::JanAushadhiTab,
            Tab::MyMedicines => Label::MyMedicines,
        }
    }

    pub fn search_placeholder(&self) -> Label {
        match self {
            Tab::Products => Label::SearchProducts,
            Tab::JanAushadhi => Label::SearchDrugs,
            Tab::MyMedicines => Label::SearchMyMedicines,
        }
    }

    /// Live collection behind the tab; `None` for the shortlist.
    pub fn collection(&self) -> Option<Collection> {
        match self {
            Tab::Products => Some(Collection::Products),
            Tab::JanAushadhi => Some(Collection::JanAushadhi),
            Tab::MyMedicines => None,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Tab::Products => "products",
            Tab::JanAushadhi => "jan-aushadhi",
            Tab::MyMedicines => "my-medicines",
        }
    }

    fn index(&self) -> usize {
        match self {
            Tab::Products => 0,
            Tab::JanAushadhi => 1,
            Tab::MyMedicines => 2,
        }
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|t| t.slug() == s)
            .ok_or_else(|| format!("unknown tab: {}", s))
    }
}

/// What a tab shows right now.
#[derive(Debug, Clone, PartialEq)]
pub enum TabView {
    /// Either collection is still loading; every tab shows the skeleton.
    Loading,
    /// A collection failed; its list is suppressed and a retry is offered.
    Failed(SubscriptionError),
    /// Cards to render; empty means "no medicines found".
    List(Vec<MedicineCard>),
}

// ============================================================================
// CATALOG
// ============================================================================

/// Called with the collection whose state changed.
pub type CatalogHook = Arc<dyn Fn(Collection, &CollectionState) + Send + Sync>;

/// Catalog - The two live medicine collections
pub struct Catalog {
    products: CollectionSubscription,
    jan_aushadhi: CollectionSubscription,
}

impl Catalog {
    /// Subscriptions are created stopped; call [`Catalog::start`].
    pub fn new(store: Option<Arc<dyn DocumentStore>>, config: &Config) -> Self {
        Self::with_hook(store, config, None)
    }

    pub fn with_hook(
        store: Option<Arc<dyn DocumentStore>>,
        config: &Config,
        hook: Option<CatalogHook>,
    ) -> Self {
        let subscribe = |collection: Collection| {
            let sub = CollectionSubscription::new(
                store.clone(),
                Some(config.collection_name(collection).to_string()),
            );
            match hook.clone() {
                Some(hook) => sub.with_on_change(move |state| hook(collection, state)),
                None => sub,
            }
        };

        Self {
            products: subscribe(Collection::Products),
            jan_aushadhi: subscribe(Collection::JanAushadhi),
        }
    }

    pub fn start(&mut self) {
        info!("subscribing to medicine collections");
        self.products.start();
        self.jan_aushadhi.start();
    }

    pub fn stop(&mut self) {
        self.products.stop();
        self.jan_aushadhi.stop();
    }

    /// Resubscribe both collections (user-triggered).
    pub fn retry(&mut self) {
        info!("retrying medicine collections");
        self.products.retry();
        self.jan_aushadhi.retry();
    }

    pub fn subscription(&self, collection: Collection) -> &CollectionSubscription {
        match collection {
            Collection::Products => &self.products,
            Collection::JanAushadhi => &self.jan_aushadhi,
        }
    }

    pub fn state(&self, collection: Collection) -> CollectionState {
        self.subscription(collection).state()
    }

    pub fn phase(&self, collection: Collection) -> Phase {
        self.subscription(collection).phase()
    }

    /// Loading while either collection is.
    pub fn is_loading(&self) -> bool {
        self.products.state().loading || self.jan_aushadhi.state().loading
    }

    /// The first collection error, products first.
    pub fn error(&self) -> Option<SubscriptionError> {
        self.products.state().error.or_else(|| self.jan_aushadhi.state().error)
    }

    /// Current records of a collection.
    pub fn records(&self, collection: Collection) -> Option<Vec<Medicine>> {
        self.state(collection).data
    }

    pub fn find(&self, collection: Collection, id: &str) -> Option<Medicine> {
        self.records(collection)?.into_iter().find(|m| m.id() == id)
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Render one tab for a viewer.
///
/// Loading wins over everything. A collection error hides both live tabs
/// but leaves the shortlist visible.
pub fn render_tab(
    catalog: &Catalog,
    shortlist: &Shortlist,
    tab: Tab,
    query: &str,
    language: Language,
) -> TabView {
    if catalog.is_loading() {
        return TabView::Loading;
    }

    let cards = match tab.collection() {
        Some(collection) => {
            if let Some(error) = catalog.error() {
                return TabView::Failed(error);
            }
            let records = catalog.records(collection);
            filter_medicines(records.as_deref(), query)
                .into_iter()
                .map(|m| MedicineCard::build(m, collection, language, true))
                .collect()
        }
        None => shortlist
            .matching(query)
            .into_iter()
            .map(|e| MedicineCard::build(&e.medicine, e.collection, language, false))
            .collect(),
    };
    TabView::List(cards)
}

/// Put a live record on `shortlist`. Returns `Ok(false)` when it was
/// already there.
pub fn add_to_shortlist(
    catalog: &Catalog,
    shortlist: &mut Shortlist,
    collection: Collection,
    id: &str,
) -> Result<bool, ShortlistError> {
    let medicine = catalog
        .find(collection, id)
        .ok_or_else(|| ShortlistError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

    if MedicineCard::build(&medicine, collection, Language::English, true).out_of_stock {
        return Err(ShortlistError::OutOfStock(id.to_string()));
    }

    let added = shortlist.add(collection, medicine);
    debug!(%collection, id, added, "shortlist add");
    Ok(added)
}

// ============================================================================
// SESSION
// ============================================================================

/// Session - One viewer's page state
#[derive(Debug, Default)]
pub struct Session {
    active: Tab,
    searches: [String; 3],
    shortlist: Shortlist,
    language: LanguageContext,
}

impl Session {
    pub fn new(language: Language) -> Self {
        Self {
            language: LanguageContext::new(language),
            ..Self::default()
        }
    }

    pub fn active_tab(&self) -> Tab {
        self.active
    }

    pub fn set_active_tab(&mut self, tab: Tab) {
        self.active = tab;
    }

    pub fn search(&self, tab: Tab) -> &str {
        &self.searches[tab.index()]
    }

    pub fn set_search(&mut self, tab: Tab, query: impl Into<String>) {
        self.searches[tab.index()] = query.into();
    }

    pub fn language(&self) -> Language {
        self.language.language()
    }

    pub fn language_context(&self) -> &LanguageContext {
        &self.language
    }

    pub fn language_context_mut(&mut self) -> &mut LanguageContext {
        &mut self.language
    }

    pub fn set_language(&mut self, language: Language) -> bool {
        self.language.set_language(language)
    }

    pub fn t(&self, label: Label) -> &'static str {
        self.language.t(label)
    }

    pub fn shortlist(&self) -> &Shortlist {
        &self.shortlist
    }

    pub fn view(&self, catalog: &Catalog, tab: Tab) -> TabView {
        render_tab(catalog, &self.shortlist, tab, self.search(tab), self.language())
    }

    pub fn add(&mut self, catalog: &Catalog, collection: Collection, id: &str) -> Result<bool, ShortlistError> {
        add_to_shortlist(catalog, &mut self.shortlist, collection, id)
    }

    /// Forget the shortlist and searches, keep the language.
    pub fn reset(&mut self) {
        self.shortlist.clear();
        self.searches = Default::default();
        self.active = Tab::Products;
    }
}
