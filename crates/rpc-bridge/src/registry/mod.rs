// Function Registry Module
//
// Holds the callables exposed by the bridge:
// - Typed registration with shape introspection
// - Per-function auth / role / timeout / rate-limit / cache policy
// - Introspection descriptors for client tooling

mod function;
pub mod introspect;
mod store;

pub use function::{FunctionInfo, FunctionOptions, RegisteredFunction};
pub use introspect::{FieldDescriptor, Shape};
pub use store::FunctionRegistry;
