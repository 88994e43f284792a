use std::collections::VecDeque;
use std::io::BufRead;

use thiserror::Error;
use tracing::{debug, trace};

use crate::observationtable::TableSnapshot;

/// The literal response an equivalence channel gives when the presented
/// hypothesis is exactly the target language.
pub const ACCEPTANCE_TOKEN: &str = "TRUE";

/// Outcome of presenting a hypothesis table to the equivalence channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Equivalence {
    /// The hypothesis is exactly the target language; learning is done.
    Accepted,
    /// A word on which the hypothesis and the target language disagree.
    Counterexample(String),
}

/// Fatal failures of an oracle channel. The learner cannot proceed past any
/// of these; they identify the query that could not be answered.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Reading from the channel failed at the transport level.
    #[error("reading from the oracle channel failed: {0}")]
    Io(#[from] std::io::Error),
    /// The channel ran out of answers while a membership query was pending.
    #[error("oracle channel ended before answering the membership query for {0:?}")]
    ExhaustedMembership(String),
    /// The channel ran out of answers while an equivalence query was pending.
    #[error("oracle channel ended before answering an equivalence query")]
    ExhaustedEquivalence,
    /// A membership answer did not parse as an integer.
    #[error("expected an integer membership answer for {word:?}, got {answer:?}")]
    MalformedMembership {
        /// The queried word.
        word: String,
        /// The answer line as read from the channel.
        answer: String,
    },
}

/// A minimally adequate teacher for the learner: answers membership queries
/// for single words and equivalence queries for serialized hypothesis
/// tables.
///
/// Both calls block until the answer is available and no two queries are
/// ever in flight at once, so an implementation is free to read answers
/// from an interactive channel in strict call order.
pub trait Oracle {
    /// Whether `word` belongs to the target language. Must be
    /// deterministic and total over all words the table will ever ask
    /// about.
    fn membership(&mut self, word: &str) -> Result<bool, OracleError>;

    /// The channel's raw response to the presented table: either the
    /// [`ACCEPTANCE_TOKEN`] or a counterexample word. Interpretation is
    /// left to the caller.
    fn equivalence(&mut self, snapshot: &TableSnapshot) -> Result<String, OracleError>;
}

/// An oracle replaying a pre-recorded transcript.
///
/// Every query, membership and equivalence alike, consumes exactly the next
/// line. Membership lines are integers, with any non-zero value meaning the
/// word belongs to the language; equivalence lines are taken verbatim. The
/// transcript therefore only fits a learner that issues its queries in
/// exactly the order the lines were recorded in.
pub struct TranscriptOracle<R> {
    transcript: R,
}

impl<R: BufRead> TranscriptOracle<R> {
    /// Wraps a reader whose lines are the oracle answers in call order.
    pub fn new(transcript: R) -> Self {
        Self { transcript }
    }

    fn next_line(&mut self) -> Result<Option<String>, OracleError> {
        let mut line = String::new();
        if self.transcript.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }
}

impl<R: BufRead> Oracle for TranscriptOracle<R> {
    fn membership(&mut self, word: &str) -> Result<bool, OracleError> {
        let answer = self
            .next_line()?
            .ok_or_else(|| OracleError::ExhaustedMembership(word.to_owned()))?;
        let value: i64 = answer.parse().map_err(|_| OracleError::MalformedMembership {
            word: word.to_owned(),
            answer: answer.clone(),
        })?;
        trace!("transcript answers {value} for {word:?}");
        Ok(value != 0)
    }

    fn equivalence(&mut self, snapshot: &TableSnapshot) -> Result<String, OracleError> {
        debug!("equivalence query for\n{snapshot}");
        self.next_line()?.ok_or(OracleError::ExhaustedEquivalence)
    }
}

/// An oracle assembled from parts: membership through a predicate on the
/// word, equivalence from a fixed script of responses handed out in order.
///
/// Useful for driving the learner against a known language without
/// recording a transcript first. Running out of scripted responses is
/// reported like an exhausted channel.
pub struct ScriptedOracle<F> {
    language: F,
    responses: VecDeque<String>,
}

impl<F: FnMut(&str) -> bool> ScriptedOracle<F> {
    /// Builds an oracle deciding membership with `language` and answering
    /// successive equivalence queries with `responses`, front to back.
    pub fn new(language: F, responses: &[&str]) -> Self {
        Self {
            language,
            responses: responses.iter().map(|r| (*r).to_owned()).collect(),
        }
    }
}

impl<F: FnMut(&str) -> bool> Oracle for ScriptedOracle<F> {
    fn membership(&mut self, word: &str) -> Result<bool, OracleError> {
        Ok((self.language)(word))
    }

    fn equivalence(&mut self, _snapshot: &TableSnapshot) -> Result<String, OracleError> {
        self.responses
            .pop_front()
            .ok_or(OracleError::ExhaustedEquivalence)
    }
}
