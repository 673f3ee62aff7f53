use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Backup,
    Copy,
    Prune,
    Check,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [Phase::Backup, Phase::Copy, Phase::Prune, Phase::Check];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Backup => "backup",
            Phase::Copy => "copy",
            Phase::Prune => "prune",
            Phase::Check => "check",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phases requested on the command line. Selecting backup also runs the copy phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSelection {
    pub backup: bool,
    pub prune: bool,
    pub check: bool,
}

impl PhaseSelection {
    pub fn all() -> Self {
        Self {
            backup: true,
            prune: true,
            check: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.backup && !self.prune && !self.check
    }

    pub fn includes(&self, phase: Phase) -> bool {
        match phase {
            Phase::Backup | Phase::Copy => self.backup,
            Phase::Prune => self.prune,
            Phase::Check => self.check,
        }
    }

    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        Phase::ORDER.into_iter().filter(|phase| self.includes(*phase))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunMode {
    pub quiet: bool,
    pub verbose: bool,
    pub debug: bool,
}
