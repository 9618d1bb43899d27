pub mod click;
pub mod descriptor;

pub use click::ClickTracker;
pub use descriptor::ElementDescriptor;
