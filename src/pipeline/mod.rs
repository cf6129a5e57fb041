// Pipeline execution and monitoring module
// Runs a clip from raw bytes to a labelled prediction, tracing each stage

pub mod run;
pub mod stage;
pub mod trace;

pub use run::{
    ClassProbability, Pipeline, PipelineError, PredictionResult, PreparedClip, SignalSettings,
};
pub use stage::Stage;
pub use trace::{read_trace_file, RequestTrace, TraceEntry, TraceError, TraceWriter};
