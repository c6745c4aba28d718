//! Module reference layer
//! - scanner.rs: Extracts module names from buffer lines
//! - resolver.rs: Resolves module names to library roots, with caching

pub mod resolver;
pub mod scanner;

pub use resolver::{ModuleResolver, ResolutionEntry, ResolverCache, library_root};
pub use scanner::{BufferScanner, ScanOutcome};
