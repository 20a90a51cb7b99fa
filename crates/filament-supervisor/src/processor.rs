//! Processors: pure units of work.

use serde_json::Value;

/// A pure transformer applied in sequence within a node's pipeline.
///
/// Processors have no identity of their own; a node feeds each one the
/// previous one's output. An `Err` aborts the pipeline and fails the node
/// with the returned cause.
pub trait Processor: Send + Sync {
    fn run(&self, payload: Value) -> Result<Value, String>;
}

/// Any `Fn(Value) -> Result<Value, String>` is a processor.
impl<F> Processor for F
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync,
{
    fn run(&self, payload: Value) -> Result<Value, String> {
        self(payload)
    }
}

pub type BoxedProcessor = Box<dyn Processor>;

/// Boxes a closure as a pipeline stage.
pub fn processor_fn<F>(f: F) -> BoxedProcessor
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
{
    Box::new(f)
}
