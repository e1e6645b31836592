//! Toylang runtime
//!
//! The tagged value model, the frame/scope environment stack, the
//! tree-walking evaluator, the intrinsic functions, and the interpreter
//! façade that wires the parser to all of them.

mod env;
mod eval;
mod interpreter;
mod intrinsics;
mod media;
mod value;

pub use env::Environment;
pub use eval::{EvalResult, ExecResult, Transfer};
pub use interpreter::{DebugFlags, Interpreter};
pub use media::Media;
pub use value::{unescape, CallContext, Callable, Invocable, NativeFn, StructDef, StructInst, Value};
