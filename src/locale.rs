// Locale - Language selection and bilingual labels
//
// The selected language is an explicit context value handed to whoever
// renders. Changing it notifies registered listeners.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Kannada,
}

impl Language {
    /// Name of the language written in itself, for the language picker.
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Kannada => "ಕನ್ನಡ",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Kannada => "kannada",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Language::English => Language::Kannada,
            Language::Kannada => Language::English,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "kannada" | "kn" => Ok(Language::Kannada),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// LocalizedString - One text in both supported languages
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalizedString {
    pub english: String,
    pub kannada: String,
}

impl LocalizedString {
    pub fn new(english: impl Into<String>, kannada: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            kannada: kannada.into(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::English => &self.english,
            Language::Kannada => &self.kannada,
        }
    }
}

// ============================================================================
// LABELS
// ============================================================================

/// Keys of every user-facing label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    AppTitle,
    AppSubtitle,
    ProductsTab,
    JanAushadhiTab,
    MyMedicines,
    SearchProducts,
    SearchDrugs,
    SearchMyMedicines,
    Stock,
    Quantity,
    Expiry,
    BatchNo,
    OutOfStock,
    AddToMyMedicines,
    NoMedicinesFound,
    NoMedicinesDescription,
    ErrorTitle,
    ErrorDescription,
    RetryButton,
    Loading,
}

impl Label {
    fn text(&self) -> (&'static str, &'static str) {
        match self {
            Label::AppTitle => ("Medicine Inventory", "ಔಷಧಿ ದಾಸ್ತಾನು"),
            Label::AppSubtitle => (
                "Check stock, price and expiry at a glance",
                "ದಾಸ್ತಾನು, ಬೆಲೆ ಮತ್ತು ಅವಧಿಯನ್ನು ಒಂದೇ ನೋಟದಲ್ಲಿ ನೋಡಿ",
            ),
            Label::ProductsTab => ("Generic Medicines", "ಜೆನೆರಿಕ್ ಔಷಧಿಗಳು"),
            Label::JanAushadhiTab => ("Jan Aushadhi", "ಜನ ಔಷಧಿ"),
            Label::MyMedicines => ("My Medicines", "ನನ್ನ ಔಷಧಿಗಳು"),
            Label::SearchProducts => ("Search by product name...", "ಉತ್ಪನ್ನದ ಹೆಸರಿನಿಂದ ಹುಡುಕಿ..."),
            Label::SearchDrugs => ("Search by drug name...", "ಔಷಧಿಯ ಹೆಸರಿನಿಂದ ಹುಡುಕಿ..."),
            Label::SearchMyMedicines => ("Search my medicines...", "ನನ್ನ ಔಷಧಿಗಳಲ್ಲಿ ಹುಡುಕಿ..."),
            Label::Stock => ("Stock", "ದಾಸ್ತಾನು"),
            Label::Quantity => ("Quantity", "ಪ್ರಮಾಣ"),
            Label::Expiry => ("Expiry", "ಅವಧಿ ಮುಕ್ತಾಯ"),
            Label::BatchNo => ("Batch No", "ಬ್ಯಾಚ್ ಸಂಖ್ಯೆ"),
            Label::OutOfStock => ("Out of Stock", "ದಾಸ್ತಾನು ಇಲ್ಲ"),
            Label::AddToMyMedicines => ("Add to My Medicines", "ನನ್ನ ಔಷಧಿಗಳಿಗೆ ಸೇರಿಸಿ"),
            Label::NoMedicinesFound => ("No medicines found", "ಯಾವುದೇ ಔಷಧಿಗಳು ಕಂಡುಬಂದಿಲ್ಲ"),
            Label::NoMedicinesDescription => (
                "Try a different search term.",
                "ಬೇರೆ ಹುಡುಕಾಟ ಪದವನ್ನು ಪ್ರಯತ್ನಿಸಿ.",
            ),
            Label::ErrorTitle => ("Something went wrong", "ಏನೋ ತಪ್ಪಾಗಿದೆ"),
            Label::ErrorDescription => (
                "We could not load the medicine list.",
                "ಔಷಧಿ ಪಟ್ಟಿಯನ್ನು ಲೋಡ್ ಮಾಡಲು ಸಾಧ್ಯವಾಗಲಿಲ್ಲ.",
            ),
            Label::RetryButton => ("Retry", "ಮತ್ತೆ ಪ್ರಯತ್ನಿಸಿ"),
            Label::Loading => ("Loading...", "ಲೋಡ್ ಆಗುತ್ತಿದೆ..."),
        }
    }

    pub fn localized(&self) -> LocalizedString {
        let (english, kannada) = self.text();
        LocalizedString::new(english, kannada)
    }
}

/// Label text in `language`.
pub fn translate(label: Label, language: Language) -> &'static str {
    let (english, kannada) = label.text();
    match language {
        Language::English => english,
        Language::Kannada => kannada,
    }
}

// ============================================================================
// LANGUAGE CONTEXT
// ============================================================================

type LanguageListener = Box<dyn Fn(Language) + Send + Sync>;

/// LanguageContext - The current language plus change listeners
///
/// Listeners run synchronously inside [`LanguageContext::set_language`] and
/// only when the language actually changes.
pub struct LanguageContext {
    current: Language,
    next_listener_id: u64,
    listeners: BTreeMap<u64, LanguageListener>,
}

impl LanguageContext {
    pub fn new(initial: Language) -> Self {
        Self {
            current: initial,
            next_listener_id: 0,
            listeners: BTreeMap::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.current
    }

    pub fn t(&self, label: Label) -> &'static str {
        translate(label, self.current)
    }

    /// Switch language. Returns `true` if it changed.
    pub fn set_language(&mut self, language: Language) -> bool {
        if language == self.current {
            return false;
        }
        debug!(from = %self.current, to = %language, "language changed");
        self.current = language;
        for listener in self.listeners.values() {
            listener(language);
        }
        true
    }

    /// Register a change listener; the returned id removes it again.
    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: Fn(Language) + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn remove_listener(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }
}

impl Default for LanguageContext {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

impl fmt::Debug for LanguageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageContext")
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
