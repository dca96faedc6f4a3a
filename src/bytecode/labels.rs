use std::collections::HashMap;

use crate::lang::literal::BitString;

/// A branch destination whose address may not be known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target(usize);

/// Allocates targets and records where each one gets placed.
#[derive(Debug, Default)]
pub struct Targets {
    addresses: Vec<Option<usize>>,
}

impl Targets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> Target {
        self.addresses.push(None);
        Target(self.addresses.len() - 1)
    }

    pub fn place(&mut self, target: Target, address: usize) {
        self.addresses[target.0] = Some(address);
    }

    pub fn address(&self, target: Target) -> Option<usize> {
        self.addresses.get(target.0).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelEntry {
    pub target: Target,
    pub defined: bool,
}

/// Label -> target map, with a defined flag per label.
///
/// Entries are created the first time a label is referenced or marked, so a
/// jump may name a label before its `mark`. Iteration follows first-reference
/// order.
#[derive(Debug, Default)]
pub struct LabelTable {
    entries: Vec<(BitString, LabelEntry)>,
    index: HashMap<BitString, usize>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `label`, creating it with a fresh target.
    pub fn entry(&mut self, label: &BitString, targets: &mut Targets) -> &mut LabelEntry {
        let slot = match self.index.get(label) {
            Some(&slot) => slot,
            None => {
                let entry = LabelEntry {
                    target: targets.allocate(),
                    defined: false,
                };
                self.entries.push((label.clone(), entry));
                self.index.insert(label.clone(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[slot].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BitString, &LabelEntry)> {
        self.entries.iter().map(|(label, entry)| (label, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
