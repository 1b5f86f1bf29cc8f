//! Pipeline module - loading, joining, feature derivation, encoding and model selection

pub mod assembler;
pub mod columns;
pub mod derive;
pub mod encoder;
pub mod error;
pub mod evaluation;
pub mod join;
pub mod loader;
pub mod logistic;
pub mod split;
pub mod stage;
pub mod traits;
pub mod tuning;
pub mod workflow;

pub use assembler::{feature_matrix, label_values, VectorAssembler};
pub use derive::*;
pub use encoder::*;
pub use error::{PipelineError, Result};
pub use evaluation::*;
pub use join::*;
pub use loader::*;
pub use logistic::{LogisticRegression, LogisticRegressionModel};
pub use split::*;
pub use stage::*;
pub use traits::*;
pub use tuning::*;
pub use workflow::*;
