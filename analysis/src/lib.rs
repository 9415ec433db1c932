pub mod capability;
pub mod category;
pub mod competition;
pub mod dcc;
pub mod demand;
pub mod event;
pub mod fingerprint;
pub mod handler;
pub mod response;

pub use capability::{CapabilityReport, analyze_capability};
pub use category::Category;
pub use competition::{CompetitionReport, analyze_competition};
pub use dcc::{DccScore, Recommendation, dcc_score};
pub use demand::{DemandReport, analyze_demand};
pub use event::ActionGroupEvent;
pub use handler::{AnalysisError, AnalysisKind};
pub use response::HandlerOutput;
