use std::time::Instant;

use owo_colors::OwoColorize;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::oracle::{Equivalence, Oracle, OracleError};
use crate::{Alphabet, ObservationTable};

const ITERATION_THRESHOLD: usize = if cfg!(debug_assertions) { 300 } else { 200000 };

/// Errors that end a learning run prematurely.
#[derive(Debug, Error)]
pub enum LStarError {
    /// The oracle channel failed or an answer could not be understood.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// The refinement loop did not stabilize within the iteration ceiling,
    /// which points at an inconsistent pair of oracles.
    #[error("no accepted hypothesis after {0} refinement iterations")]
    IterationLimit(usize),
}

/// The L* learner.
///
/// Drives its [`ObservationTable`] to a closed and consistent state,
/// presents the resulting hypothesis to the equivalence channel and absorbs
/// counterexamples into the suffix set, until a hypothesis is accepted. All
/// membership traffic goes through the table's memoized query path.
pub struct LStar<O> {
    table: ObservationTable<O>,
}

impl<O: Oracle> LStar<O> {
    /// Sets up the learner over `alphabet`, issuing the membership queries
    /// for the initial table.
    pub fn new(alphabet: Alphabet, oracle: O) -> Result<Self, OracleError> {
        Ok(Self {
            table: ObservationTable::new(alphabet, oracle)?,
        })
    }

    /// The observation table in its current state.
    pub fn table(&self) -> &ObservationTable<O> {
        &self.table
    }

    /// Runs the learning loop until the equivalence channel accepts a
    /// hypothesis.
    ///
    /// Each iteration first closes the table, then makes it consistent,
    /// then asks the equivalence channel; a counterexample feeds its tails
    /// into the suffix set and starts the next iteration. The number of
    /// iterations is capped by a compile-profile-dependent threshold that
    /// the `MAX_ITERATIONS` environment variable overrides, so a pair of
    /// oracles that can never agree surfaces as an error instead of a hang.
    pub fn run(&mut self) -> Result<(), LStarError> {
        let threshold = std::env::var("MAX_ITERATIONS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(ITERATION_THRESHOLD);
        let start = Instant::now();

        for _ in 0..threshold {
            while let Some(extension) = self.table.unclosed_extension() {
                debug!(
                    "table is not closed, promoting {} into the prefix set",
                    extension.blue()
                );
                self.table.add_prefix(&extension)?;
            }
            while let Some(suffix) = self.table.inconsistent_suffix()? {
                debug!(
                    "table is not consistent, adding distinguishing suffix {}",
                    suffix.blue()
                );
                self.table.add_suffix(&suffix)?;
            }
            trace!("table is closed and consistent\n{:?}", self.table);

            match self.table.equivalence_query()? {
                Equivalence::Accepted => {
                    info!(
                        "hypothesis with {} states accepted after {}ms",
                        self.table.class_representatives().len(),
                        start.elapsed().as_millis()
                    );
                    return Ok(());
                }
                Equivalence::Counterexample(word) => {
                    info!("received counterexample {}", word.blue());
                    self.absorb_counterexample(&word)?;
                }
            }
        }

        Err(LStarError::IterationLimit(threshold))
    }

    /// Inserts every tail of the counterexample into the suffix set, full
    /// word first down to the empty suffix, skipping tails already present.
    fn absorb_counterexample(&mut self, word: &str) -> Result<(), OracleError> {
        let tails = word.char_indices().map(|(at, _)| &word[at..]).chain([""]);
        for tail in tails {
            if self.table.has_suffix(tail) {
                continue;
            }
            debug!("adding counterexample suffix {}", tail.blue());
            self.table.add_suffix(tail)?;
        }
        Ok(())
    }
}
