pub mod types;

pub use types::{AnnotatedTx, DraftTx, EstimateOptions, PriceQuote, PriceSource};
