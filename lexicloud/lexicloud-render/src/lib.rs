//! Output artifacts: the word cloud image and the keyword report.

pub mod atomic;
pub mod layout;
pub mod report;
pub mod wordcloud;

pub use atomic::write_atomic;
pub use layout::{place_words, LayoutConfig, OccupancyGrid, Orientation, PlacedWord};
pub use report::ReportWriter;
pub use wordcloud::{parse_color, RenderedCloud, WordCloudRenderer};
