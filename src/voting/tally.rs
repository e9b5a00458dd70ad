use crate::voting::candidate::Candidate;
use std::collections::BTreeMap;
use std::fmt;

/// Valid-ballot counts per candidate id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<u8, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, candidate: Candidate) {
        *self.counts.entry(candidate.id()).or_insert(0) += 1;
    }

    pub fn votes_for(&self, candidate: u8) -> usize {
        self.counts.get(&candidate).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Candidates with at least one vote, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.counts.iter().map(|(c, n)| (*c, *n))
    }

    pub fn into_map(self) -> BTreeMap<u8, usize> {
        self.counts
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Candidate\tVotes")?;
        for (candidate, votes) in self.iter() {
            writeln!(f, "{}\t\t{}", candidate, votes)?;
        }
        Ok(())
    }
}
