pub mod config;
pub mod error;
pub mod hierarchy;
pub mod memo;
pub mod pipeline;
pub mod record;
pub mod scale;
pub mod style;
pub mod table;
pub mod util;

pub use config::{ColorMode, FieldMapping, RenderSettings, RootPolicy};
pub use error::{PipelineError, Result};
pub use hierarchy::{NodeIndex, TreeNode};
pub use pipeline::{Pipeline, PipelineStats, Prepared};
pub use record::Record;
pub use scale::{ColorScale, SizeScale};
pub use style::{NodeStyle, NodeStyler};
