//! Module reference scanner
//!
//! Finds module references in buffer lines with a plain textual match, no parsing.
//!
//! Recognized forms:
//! - `require("foo.bar")`, `require "foo.bar"`, `require 'foo.bar'`
//! - `---@module "foo.bar"` annotations

use regex::Regex;
use tracing::{debug, warn};

use crate::host::{BufferId, BufferSource};
use crate::module::resolver::ModuleResolver;
use crate::workspace::WorkspaceLibrary;

/// Result of scanning a line range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Module references found in the range
    pub references: usize,
    /// Library paths newly added to the workspace
    pub added: usize,
}

impl ScanOutcome {
    pub fn changed(&self) -> bool {
        self.added > 0
    }
}

/// Extracts module references from buffer lines and feeds them to the resolver
pub struct BufferScanner {
    /// Matches a `require` call or `---@module` annotation with a single string literal
    reference_re: Regex,
}

impl BufferScanner {
    pub fn new() -> Self {
        Self {
            reference_re: Regex::new(
                r#"(?:\brequire\s*\(?|---@module)\s*(?:"(\w[\w./-]*)"|'(\w[\w./-]*)')"#,
            )
            .unwrap(),
        }
    }

    /// Module names referenced on a single line, in order of appearance
    pub fn module_names<'a>(&self, line: &'a str) -> Vec<&'a str> {
        self.reference_re
            .captures_iter(line)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str())
            .collect()
    }

    /// Scan lines `[first, last)` of `buffer` and add every resolved library
    /// root to `library`.
    ///
    /// Unreadable buffers and non-matching lines are skipped.
    pub fn scan(
        &self,
        buffers: &dyn BufferSource,
        resolver: &mut ModuleResolver,
        library: &mut WorkspaceLibrary,
        buffer: BufferId,
        first: usize,
        last: usize,
    ) -> ScanOutcome {
        let lines = match buffers.get_lines(buffer, first, last) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Skipping scan of buffer {}: {}", buffer, e);
                return ScanOutcome::default();
            }
        };

        let mut outcome = ScanOutcome::default();
        for line in &lines {
            for name in self.module_names(line) {
                outcome.references += 1;
                let Some(path) = resolver.resolve(name) else {
                    continue;
                };
                if library.add(&path) {
                    outcome.added += 1;
                }
            }
        }

        debug!(
            "Scanned buffer {} lines {}..{}: {} references, {} new libraries",
            buffer, first, last, outcome.references, outcome.added
        );
        outcome
    }
}

impl Default for BufferScanner {
    fn default() -> Self {
        Self::new()
    }
}
