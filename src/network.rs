use crate::error::Result;

pub mod io;
pub mod layer;

pub use io::NetworkIO;
pub use layer::FlatLayer;

/// Evaluators keep working memory between calls, e.g. the context neurons of recurrent nets.
pub trait StatefulEvaluator {
    fn evaluate<T: NetworkIO>(&mut self, input: T) -> Result<T>;
    fn reset_internal_state(&mut self);
}

/// Turns an ordered list of layer descriptions (input first, output last) into something evaluable.
pub trait Fabricator {
    type Output: StatefulEvaluator;

    fn fabricate(layers: &[FlatLayer]) -> Result<Self::Output>;
}
