pub mod expression;
pub mod layer;
pub mod paint;
pub mod style;
pub mod symbology;

pub use expression::*;
pub use layer::*;
pub use paint::*;
pub use style::*;
pub use symbology::*;
