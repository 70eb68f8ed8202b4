pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod motif;
pub mod parser;

pub use builder::{BuilderGraph, BuilderNode, BuilderNodeId, BuilderNodeKind, MotifSpec};
pub use clock::{ClockOrdering, VectorTimestamp};
pub use config::Config;
pub use error::{MotifError, ParseError, PatternError};
pub use event::LogEvent;
pub use graph::{CausalEdge, CausalityGraph, EventId, GraphStats};
pub use motif::{Motif, MotifFinder};
pub use parser::{Execution, LogParser, ParsedLog};
