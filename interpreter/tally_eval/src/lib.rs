//! Tree-walking evaluator for the Tally interpreter.
//!
//! The mechanics live in focused modules: [`value`] defines the
//! runtime value and binding types, [`operators`] the promotion
//! lattice behind every arithmetic operator, [`range`] the iteration
//! protocol with its closed-form shortcuts, and [`interpreter`] the
//! session that walks parse trees and owns the scope chain, mode
//! stacks and constants worker.

pub mod builtins;
pub mod compare;
pub mod convert;
pub mod displayer;
pub mod environment;
pub mod errors;
pub mod host;
pub mod interpreter;
pub mod operators;
pub mod pi_worker;
pub mod range;
pub mod render;
pub mod settings;
pub mod value;

pub use displayer::{Channel, Displayer};
pub use tally_ir::{ModeSetting, TrigUnits};
pub use errors::{ControlSignal, ErrorKind, EvalError, EvalResult};
pub use host::{Host, MemoryHost, StdHost};
pub use interpreter::{ProcessOutcome, Session, VERSION};
pub use render::{render, RenderConfig};
pub use settings::Settings;
pub use value::{Binding, BindingKind, ObjectMap, Value};
