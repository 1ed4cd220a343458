//! Machine Translation Module
//!
//! Fills the gaps of target-locale trees with machine translations.
//!
//! 1. **MT Trait & Providers** - [`MachineTranslator`] with a Google Translate implementation
//!    and a deterministic mock
//! 2. **Driver** - [`MachineTranslationDriver`] walks a locale tree, works out the source text
//!    of every leaf and writes translations back at the same dotted key
//!
//! # Example
//!
//! ```ignore
//! use i18n_harvest::mt::{MachineTranslationDriver, MockMode, MockTranslator};
//! use i18n_harvest::tree::KeyPathTree;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut fr = KeyPathTree::new();
//!     fr.set_path("greeting", "__NEEDS_TRANSLATION__", false).unwrap();
//!     let mut en = KeyPathTree::new();
//!     en.set_path("greeting", "Hello", false).unwrap();
//!
//!     let provider = MockTranslator::new(MockMode::Suffix);
//!     let driver = MachineTranslationDriver::new(&provider, "en", "__NEEDS_TRANSLATION__");
//!     driver.translate_tree("fr", &mut fr, &en).await;
//!     // fr is now {"greeting": "Hello_fr"}
//! }
//! ```

pub mod driver;
pub mod error;
pub mod google_translate;
pub mod mock;
pub mod translator;

pub use driver::{MachineTranslationDriver, TranslationRequest, TranslationStats};
pub use error::{MtError, MtResult};
pub use google_translate::GoogleTranslateProvider;
pub use mock::{MockMode, MockTranslator};
pub use translator::{MachineTranslator, TextFormat, normalize_locale, validate_locale};
