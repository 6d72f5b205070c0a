//! Shared data types for the Famulus desk-agent ecosystem.

mod graph;
mod interaction;
mod knowledge;
mod outcome;
mod session;
mod task;

pub use graph::{GraphEdge, ProjectContext, RemoteFetch, ResourceUse, SyncReport, WorkspaceGroup};
pub use interaction::{Interaction, InteractionChannel, NewInteraction};
pub use knowledge::{KnowledgeEntry, KnowledgeSource};
pub use outcome::{OpOutcome, ProgressNote, ProgressSink};
pub use session::SessionRecord;
pub use task::{
    DiagnoseParams, Directive, MemoryStats, RunOutcome, TaskContext, TaskRequest, TrainingReport,
    TrainingStats,
};
