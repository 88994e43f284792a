use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use owo_colors::OwoColorize;
use tracing::trace;

use crate::math;
use crate::oracle::{Equivalence, Oracle, OracleError, ACCEPTANCE_TOKEN};
use crate::Alphabet;

fn show_word(word: &str) -> &str {
    if word.is_empty() {
        "ε"
    } else {
        word
    }
}

/// The serialized form of an observation table, as it is presented to the
/// equivalence channel: the access prefixes of S, the boundary prefixes
/// reached from S by a single symbol, the distinguishing suffixes of E and
/// the row-major membership values for all of them.
///
/// The [`Display`](fmt::Display) rendering marks the empty word as ε.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    /// The prefixes of S in ascending order.
    pub main_prefixes: Vec<String>,
    /// Every `s·a` with `s` in S that is not itself in S, generated prefix
    /// by prefix with symbols ascending.
    pub boundary_prefixes: Vec<String>,
    /// The suffixes of E in ascending order.
    pub suffixes: Vec<String>,
    /// Membership values, one row per main prefix followed by one row per
    /// boundary prefix, each row ordered like `suffixes`.
    pub values: Vec<bool>,
}

impl fmt::Display for TableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "main prefixes: {}",
            self.main_prefixes.iter().map(|w| show_word(w)).join(" ")
        )?;
        writeln!(
            f,
            "boundary prefixes: {}",
            self.boundary_prefixes.iter().map(|w| show_word(w)).join(" ")
        )?;
        writeln!(
            f,
            "suffixes: {}",
            self.suffixes.iter().map(|w| show_word(w)).join(" ")
        )?;
        write!(
            f,
            "values: {}",
            self.values.iter().map(|v| if *v { "1" } else { "0" }).join(" ")
        )
    }
}

/// The observation table at the heart of the learner.
///
/// It owns the access prefixes S, the distinguishing suffixes E, the
/// memoized membership answers for every row key in S ∪ S·A against every
/// suffix, and the oracle those answers come from. After construction and
/// after every public mutator the table is fully populated: each row key
/// holds an entry for each suffix.
pub struct ObservationTable<O> {
    alphabet: Alphabet,
    prefixes: BTreeSet<String>,
    suffixes: BTreeSet<String>,
    entries: math::Map<String, math::Map<String, bool>>,
    oracle: O,
}

impl<O: Oracle> ObservationTable<O> {
    /// Sets up the table for the given alphabet with S = E = {ε} and
    /// issues the membership queries that populate it.
    pub fn new(alphabet: Alphabet, oracle: O) -> Result<Self, OracleError> {
        let mut table = Self {
            alphabet,
            prefixes: BTreeSet::from([String::new()]),
            suffixes: BTreeSet::from([String::new()]),
            entries: math::Map::default(),
            oracle,
        };
        table.populate("")?;
        Ok(table)
    }

    /// Issues a membership query for `word`, short-circuiting through the
    /// table when `word` is already a row key with a recorded ε column.
    ///
    /// This is deliberately not a general memo table: a word that has only
    /// ever appeared as a prefix·suffix concatenation is asked again.
    fn membership(&mut self, word: &str) -> Result<bool, OracleError> {
        if let Some(known) = self.entries.get(word).and_then(|row| row.get("")) {
            return Ok(*known);
        }
        self.oracle.membership(word)
    }

    fn fill(&mut self, key: &str, suffix: &str) -> Result<(), OracleError> {
        if self
            .entries
            .get(key)
            .map_or(false, |row| row.contains_key(suffix))
        {
            return Ok(());
        }
        let answer = self.membership(&format!("{key}{suffix}"))?;
        self.entries
            .entry(key.to_owned())
            .or_default()
            .insert(suffix.to_owned(), answer);
        Ok(())
    }

    /// Fills the rows of `prefix` and of all its one-symbol extensions
    /// against the current suffix set.
    fn populate(&mut self, prefix: &str) -> Result<(), OracleError> {
        let suffixes: Vec<String> = self.suffixes.iter().cloned().collect();
        let symbols: Vec<char> = self.alphabet.symbols().collect();
        for e in &suffixes {
            self.fill(prefix, e)?;
        }
        for &a in &symbols {
            let extension = format!("{prefix}{a}");
            for e in &suffixes {
                self.fill(&extension, e)?;
            }
        }
        Ok(())
    }

    /// Adds `prefix` to S and fills in every entry that is now required,
    /// keeping the table fully populated over S ∪ S·A. Re-adding a known
    /// prefix changes nothing.
    pub fn add_prefix(&mut self, prefix: &str) -> Result<(), OracleError> {
        self.prefixes.insert(prefix.to_owned());
        self.populate(prefix)
    }

    /// Adds `suffix` to E and extends the row of every prefix in S and of
    /// every one-symbol extension by the new column. Re-adding a known
    /// suffix changes nothing.
    pub fn add_suffix(&mut self, suffix: &str) -> Result<(), OracleError> {
        self.suffixes.insert(suffix.to_owned());
        let prefixes: Vec<String> = self.prefixes.iter().cloned().collect();
        let symbols: Vec<char> = self.alphabet.symbols().collect();
        for s in &prefixes {
            self.fill(s, suffix)?;
            for &a in &symbols {
                let extension = format!("{s}{a}");
                self.fill(&extension, suffix)?;
            }
        }
        Ok(())
    }

    /// Searches for a pair of prefixes with equal rows whose one-symbol
    /// extensions disagree. The first disagreement found (prefixes and
    /// symbols ascending) yields the new distinguishing suffix `a·e`, built
    /// from the extending symbol and the first suffix the extension rows
    /// differ on. `Ok(None)` means the table is consistent.
    ///
    /// Entries not yet recorded are computed on demand through the memoized
    /// query, without being persisted.
    pub fn inconsistent_suffix(&mut self) -> Result<Option<String>, OracleError> {
        let prefixes: Vec<String> = self.prefixes.iter().cloned().collect();
        let suffixes: Vec<String> = self.suffixes.iter().cloned().collect();
        let symbols: Vec<char> = self.alphabet.symbols().collect();
        for (i, s1) in prefixes.iter().enumerate() {
            for s2 in &prefixes[i + 1..] {
                if self.row(s1) != self.row(s2) {
                    continue;
                }
                for &a in &symbols {
                    let row1 = self.extension_row(s1, a, &suffixes)?;
                    let row2 = self.extension_row(s2, a, &suffixes)?;
                    if let Some(at) = row1.iter().zip(&row2).position(|(x, y)| x != y) {
                        return Ok(Some(format!("{a}{}", suffixes[at])));
                    }
                }
            }
        }
        Ok(None)
    }

    fn extension_row(
        &mut self,
        prefix: &str,
        symbol: char,
        suffixes: &[String],
    ) -> Result<Vec<bool>, OracleError> {
        let key = format!("{prefix}{symbol}");
        let mut row = Vec::with_capacity(suffixes.len());
        for e in suffixes {
            let value = match self.entries.get(&key).and_then(|r| r.get(e)).copied() {
                Some(v) => v,
                None => self.membership(&format!("{key}{e}"))?,
            };
            row.push(value);
        }
        Ok(row)
    }

    /// Presents the current table to the equivalence channel. The raw
    /// response is compared against [`ACCEPTANCE_TOKEN`]; anything else is
    /// passed through verbatim as a counterexample.
    pub fn equivalence_query(&mut self) -> Result<Equivalence, OracleError> {
        let snapshot = self.snapshot();
        trace!("presenting hypothesis table\n{snapshot}");
        let response = self.oracle.equivalence(&snapshot)?;
        if response == ACCEPTANCE_TOKEN {
            Ok(Equivalence::Accepted)
        } else {
            Ok(Equivalence::Counterexample(response))
        }
    }
}

impl<O> ObservationTable<O> {
    /// The row of membership values for `key`, ordered by ascending suffix.
    ///
    /// Panics when `key` is not a current row key of the table, which would
    /// mean the population invariant is broken.
    pub fn row(&self, key: &str) -> Vec<bool> {
        let Some(entries) = self.entries.get(key) else {
            panic!("no observations recorded for {key:?}");
        };
        self.suffixes
            .iter()
            .map(|e| {
                *entries
                    .get(e)
                    .unwrap_or_else(|| panic!("missing entry for {key:?} under suffix {e:?}"))
            })
            .collect()
    }

    /// Searches for a one-symbol extension of a prefix whose row matches no
    /// row of S, in ascending prefix then symbol order. `None` means the
    /// table is closed.
    pub fn unclosed_extension(&self) -> Option<String> {
        let known: math::Set<Vec<bool>> = self.prefixes.iter().map(|s| self.row(s)).collect();
        for s in &self.prefixes {
            for a in self.alphabet.symbols() {
                let extension = format!("{s}{a}");
                if !known.contains(&self.row(&extension)) {
                    return Some(extension);
                }
            }
        }
        None
    }

    /// Serializes the table into the payload handed to the equivalence
    /// channel.
    pub fn snapshot(&self) -> TableSnapshot {
        let main_prefixes: Vec<String> = self.prefixes.iter().cloned().collect();
        let mut boundary_prefixes = Vec::new();
        for s in &self.prefixes {
            for a in self.alphabet.symbols() {
                let extension = format!("{s}{a}");
                if !self.prefixes.contains(&extension) {
                    boundary_prefixes.push(extension);
                }
            }
        }
        let values = main_prefixes
            .iter()
            .chain(&boundary_prefixes)
            .flat_map(|key| self.row(key))
            .collect();
        TableSnapshot {
            main_prefixes,
            boundary_prefixes,
            suffixes: self.suffixes.iter().cloned().collect(),
            values,
        }
    }

    /// Groups the prefixes of S by their row, assigning class indices in
    /// ascending prefix order. Prefixes mapped to the same index are
    /// behaviorally indistinguishable under the current suffixes; once the
    /// table is closed and consistent these classes are the states of the
    /// hypothesis.
    pub fn equivalence_classes(&self) -> math::Map<String, usize> {
        let mut ids: math::Map<Vec<bool>, usize> = math::Map::default();
        let mut classes = math::Map::default();
        for s in &self.prefixes {
            let next = ids.len();
            let id = *ids.entry(self.row(s)).or_insert(next);
            classes.insert(s.clone(), id);
        }
        classes
    }

    /// The shortest prefix of every equivalence class together with its
    /// acceptance, ordered by class index. Ties among equally short
    /// representatives go to the lexicographically least one.
    pub fn class_representatives(&self) -> Vec<(String, bool)> {
        let classes = self.equivalence_classes();
        let count = classes.values().copied().max().map_or(0, |m| m + 1);
        let mut representatives: Vec<Option<String>> = vec![None; count];
        for (prefix, id) in classes {
            let slot = &mut representatives[id];
            let shorter = slot
                .as_ref()
                .map_or(true, |cur| (prefix.len(), prefix.as_str()) < (cur.len(), cur.as_str()));
            if shorter {
                *slot = Some(prefix);
            }
        }
        representatives
            .into_iter()
            .flatten()
            .map(|rep| {
                let accepted = *self
                    .entries
                    .get(&rep)
                    .and_then(|row| row.get(""))
                    .expect("every prefix row has an ε entry");
                (rep, accepted)
            })
            .collect()
    }

    /// The alphabet this table observes words over.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Iterates the access prefixes of S in ascending order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> + '_ {
        self.prefixes.iter().map(String::as_str)
    }

    /// Iterates the distinguishing suffixes of E in ascending order.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> + '_ {
        self.suffixes.iter().map(String::as_str)
    }

    /// Returns true if `suffix` is already part of E.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.suffixes.contains(suffix)
    }
}

impl<O> fmt::Debug for ObservationTable<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        let mut header = vec![String::new()];
        header.extend(self.suffixes.iter().map(|e| show_word(e).to_string()));
        builder.push_record(header);

        for s in &self.prefixes {
            let mut record = vec![show_word(s).blue().to_string()];
            for value in self.row(s) {
                record.push(if value { "1" } else { "0" }.to_string());
            }
            builder.push_record(record);
        }
        for s in &self.prefixes {
            for a in self.alphabet.symbols() {
                let extension = format!("{s}{a}");
                if self.prefixes.contains(&extension) {
                    continue;
                }
                let mut record = vec![extension.clone()];
                for value in self.row(&extension) {
                    record.push(if value { "1" } else { "0" }.to_string());
                }
                builder.push_record(record);
            }
        }

        write!(f, "{}", builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ScriptedOracle;

    struct Logged<F> {
        language: F,
        queried: Vec<String>,
    }

    impl<F> Logged<F> {
        fn new(language: F) -> Self {
            Self {
                language,
                queried: Vec::new(),
            }
        }
    }

    impl<F: FnMut(&str) -> bool> Oracle for Logged<F> {
        fn membership(&mut self, word: &str) -> Result<bool, OracleError> {
            self.queried.push(word.to_owned());
            Ok((self.language)(word))
        }

        fn equivalence(&mut self, _snapshot: &TableSnapshot) -> Result<String, OracleError> {
            Ok(ACCEPTANCE_TOKEN.to_owned())
        }
    }

    fn even_count_of_a(word: &str) -> bool {
        word.chars().filter(|&c| c == 'a').count() % 2 == 0
    }

    #[test]
    fn construction_populates_prefixes_and_extensions() {
        let oracle = ScriptedOracle::new(|w: &str| w.len() % 2 == 0, &[]);
        let table = ObservationTable::new(Alphabet::from("ab"), oracle).unwrap();
        assert_eq!(table.row(""), [true]);
        assert_eq!(table.row("a"), [false]);
        assert_eq!(table.row("b"), [false]);
    }

    #[test]
    fn mutators_keep_the_table_fully_populated() {
        let oracle = ScriptedOracle::new(|w: &str| w.ends_with('b'), &[]);
        let mut table = ObservationTable::new(Alphabet::from("ab"), oracle).unwrap();
        table.add_prefix("b").unwrap();
        table.add_suffix("ba").unwrap();

        let suffix_count = table.suffixes().count();
        let prefixes: Vec<String> = table.prefixes().map(str::to_owned).collect();
        for s in prefixes {
            assert_eq!(table.row(&s).len(), suffix_count);
            for a in table.alphabet().symbols().collect::<Vec<_>>() {
                assert_eq!(table.row(&format!("{s}{a}")).len(), suffix_count);
            }
        }
    }

    #[test]
    fn closedness_witness_is_first_unmatched_extension() {
        let oracle = ScriptedOracle::new(even_count_of_a, &[]);
        let mut table = ObservationTable::new(Alphabet::from("a"), oracle).unwrap();
        assert_eq!(table.unclosed_extension(), Some("a".to_owned()));
        table.add_prefix("a").unwrap();
        assert_eq!(table.unclosed_extension(), None);
    }

    #[test]
    fn inconsistency_yields_distinguishing_suffix() {
        let oracle = ScriptedOracle::new(|w: &str| w.ends_with("ab"), &[]);
        let mut table = ObservationTable::new(Alphabet::from("ab"), oracle).unwrap();
        table.add_prefix("a").unwrap();
        // ε and "a" share the all-zero row, but appending 'b' separates them.
        assert_eq!(table.inconsistent_suffix().unwrap(), Some("b".to_owned()));
        table.add_suffix("b").unwrap();
        assert_eq!(table.inconsistent_suffix().unwrap(), None);
    }

    #[test]
    fn membership_cache_only_covers_rooted_words() {
        let oracle = Logged::new(|w: &str| w.len() % 2 == 0);
        let mut table = ObservationTable::new(Alphabet::from("a"), oracle).unwrap();
        assert_eq!(table.oracle.queried, ["", "a"]);
        table.add_prefix("a").unwrap();
        assert_eq!(table.oracle.queried, ["", "a", "aa"]);
        // "a" and "aa" are rooted row keys with recorded ε columns, so the
        // new column only asks about the single genuinely unknown word.
        table.add_suffix("a").unwrap();
        assert_eq!(table.oracle.queried, ["", "a", "aa", "aaa"]);
    }

    #[test]
    fn reinsertion_is_a_no_op() {
        let oracle = Logged::new(|w: &str| w.is_empty());
        let mut table = ObservationTable::new(Alphabet::from("a"), oracle).unwrap();
        table.add_prefix("a").unwrap();
        let queried = table.oracle.queried.len();

        table.add_prefix("a").unwrap();
        table.add_suffix("").unwrap();

        assert_eq!(table.prefixes().collect::<Vec<_>>(), ["", "a"]);
        assert_eq!(table.suffixes().collect::<Vec<_>>(), [""]);
        assert_eq!(table.oracle.queried.len(), queried);
    }

    #[test]
    fn snapshot_lists_rows_in_table_order() {
        let oracle = ScriptedOracle::new(even_count_of_a, &[]);
        let mut table = ObservationTable::new(Alphabet::from("a"), oracle).unwrap();
        table.add_prefix("a").unwrap();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.main_prefixes, ["", "a"]);
        assert_eq!(snapshot.boundary_prefixes, ["aa"]);
        assert_eq!(snapshot.suffixes, [""]);
        assert_eq!(snapshot.values, [true, false, true]);
        assert_eq!(
            snapshot.to_string(),
            "main prefixes: ε a\nboundary prefixes: aa\nsuffixes: ε\nvalues: 1 0 1"
        );
    }

    #[test]
    fn equivalence_query_matches_the_acceptance_token() {
        let oracle = ScriptedOracle::new(|_: &str| true, &["TRUE"]);
        let mut table = ObservationTable::new(Alphabet::from("a"), oracle).unwrap();
        assert_eq!(table.equivalence_query().unwrap(), Equivalence::Accepted);
    }

    #[test]
    fn any_other_response_is_a_counterexample() {
        let oracle = ScriptedOracle::new(|_: &str| true, &["ba"]);
        let mut table = ObservationTable::new(Alphabet::from("ab"), oracle).unwrap();
        assert_eq!(
            table.equivalence_query().unwrap(),
            Equivalence::Counterexample("ba".to_owned())
        );
    }

    #[test]
    fn class_representatives_pick_shortest_members() {
        let oracle = ScriptedOracle::new(even_count_of_a, &[]);
        let mut table = ObservationTable::new(Alphabet::from("a"), oracle).unwrap();
        table.add_prefix("a").unwrap();
        table.add_prefix("aa").unwrap();

        let classes = table.equivalence_classes();
        assert_eq!(classes[""], 0);
        assert_eq!(classes["a"], 1);
        assert_eq!(classes["aa"], 0);
        assert_eq!(
            table.class_representatives(),
            [("".to_owned(), true), ("a".to_owned(), false)]
        );
    }
}
