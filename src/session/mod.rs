pub mod drill;
pub mod result;

pub use drill::{AnswerOutcome, DrillSession, Phase, SessionMeta, SessionState};
pub use result::{ItemTally, SessionResult};
