mod session;
mod variant;

pub use session::{Metadata, Session, SessionStatus, SessionSummary, SessionUpdate};
pub use variant::{PrimaryMetric, VariantMetrics, VariantResult, VariantScore, WinnerReport};
