//! Active learning of regular languages through membership and equivalence
//! queries, in the style of Angluin's L* algorithm.
//!
//! The crate revolves around two pieces. An [`ObservationTable`] owns the
//! access prefixes S, the distinguishing suffixes E and the memoized
//! membership answers for every combination of the two; it can check itself
//! for closedness and consistency and serialize the hypothesis it encodes
//! into a [`TableSnapshot`]. The [`LStar`] learner drives the table: it
//! promotes unclosed extensions into S, turns inconsistencies into new
//! suffixes, presents the stable table to the equivalence channel and feeds
//! the tails of every counterexample back into E, until a hypothesis is
//! accepted.
//!
//! Oracles are anything implementing [`Oracle`]: answers can come from a
//! pre-recorded transcript ([`TranscriptOracle`]), from a predicate plus a
//! scripted sequence of equivalence responses ([`ScriptedOracle`]), or from
//! any other blocking request/response channel. The hypothesis itself is
//! never materialized as an automaton; its states are visible as the
//! equivalence classes of table rows.

mod alphabet;
pub use alphabet::Alphabet;

pub mod math;

mod observationtable;
pub use observationtable::*;

mod lstar;
pub use lstar::*;

mod oracle;
pub use oracle::*;
