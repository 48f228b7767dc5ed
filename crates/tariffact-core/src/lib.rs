pub mod dedup;
pub mod expand;
pub mod jurisdiction;
pub mod normalize;
pub mod record;
pub mod recover;
pub mod schema;

pub use dedup::dedup_records;
pub use expand::expand;
pub use jurisdiction::Jurisdiction;
pub use normalize::{NormalizeReport, normalize_record};
pub use record::{
    CandidateRecord, CanonicalFact, DocumentMeta, DutyRate, FactPatch, MergeOutcome, MergeStats,
};
pub use recover::{ParseQuality, recover_items};
pub use schema::facts;
