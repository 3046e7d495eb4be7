//! Document ingestion for lexicloud.
//!
//! This crate finds Word, PDF and OFD documents in a directory, extracts their
//! text, cleans it, and loads the word lists used to filter terms.

pub mod loader;
pub mod parsers;
pub mod preprocess;
pub mod wordlists;

pub use loader::{DiscoveredFile, DocumentLoader};
pub use parsers::{DocParser, DocumentParser, DocxParser, OfdParser, ParserRegistry, PdfParser};
pub use preprocess::{is_cjk_ideograph, truncate_chars, TextPreprocessor, Tokenizer};
pub use wordlists::{load_excluded_keywords, load_stopwords, load_word_list, parse_word_list};
