//! Process evaluators
//!
//! The state route does not evaluate processes itself; it delegates to an
//! [`Evaluator`] and only decides how long the caller waits for it.
//!
//! - [`UpstreamEvaluator`] - forwards to another node's `/state` endpoint

mod traits;
mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use traits::{EvalError, EvalResult, Evaluator};
pub use upstream::{UpstreamEvaluator, checkpoint_from_headers};
