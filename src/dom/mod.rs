pub mod document;
pub mod selector_path;
pub mod traits;

pub use document::HtmlDocument;
pub use selector_path::selector_path;
pub use traits::{Dom, ElementFacts, ElementHandle};
