//! FM instrument remapping for building .HMQ files
//!
//! An HMQ plays through the OPL driver with a pair of instrument banks
//! instead of a General MIDI synth, so program numbers are rewritten to point
//! at the matching patch in the chosen bank. Entries 0-127 are melodic
//! programs, 128-255 are keyed by percussion note.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Total mapping from an input program index to an output program index
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProgramMap([u8; 256]);

impl ProgramMap {
    /// Maps every program to itself
    pub const IDENTITY: ProgramMap = ProgramMap::identity();

    const fn identity() -> Self {
        let mut table = [0u8; 256];
        let mut i = 0;
        while i < 256 {
            table[i] = i as u8;
            i += 1;
        }
        ProgramMap(table)
    }

    pub const fn from_table(table: [u8; 256]) -> Self {
        ProgramMap(table)
    }

    pub fn map(&self, program: u8) -> u8 {
        self.0[program as usize]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl fmt::Debug for ProgramMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            write!(f, "ProgramMap(identity)")
        } else {
            f.debug_tuple("ProgramMap").field(&&self.0[..]).finish()
        }
    }
}

// The MELODIC/DRUM banks already follow General MIDI
static MELODIC: ProgramMap = ProgramMap::IDENTITY;
// TODO: fill in by matching each bank's patches against the GM programs
static INTMELO: ProgramMap = ProgramMap::IDENTITY;
static HAMMELO: ProgramMap = ProgramMap::IDENTITY;
static RICKMELO: ProgramMap = ProgramMap::IDENTITY;
static D2MELOD: ProgramMap = ProgramMap::IDENTITY;

/// An FM instrument bank pairing an HMQ can be prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FmBank {
    /// MELODIC.BNK / DRUM.BNK (Descent 1 and 2)
    Melodic,
    /// INTMELO.BNK / INTDRUM.BNK (Descent 1)
    Intmelo,
    /// HAMMELO.BNK / HAMDRUM.BNK (Descent 1)
    Hammelo,
    /// RICKMELO.BNK / RICKDRUM.BNK (Descent 1)
    Rickmelo,
    /// D2MELOD.BNK / D2DRUMS.BNK (Descent 2)
    D2Melod,
}

impl FmBank {
    pub const ALL: [FmBank; 5] = [
        FmBank::Melodic,
        FmBank::Intmelo,
        FmBank::Hammelo,
        FmBank::Rickmelo,
        FmBank::D2Melod,
    ];

    /// Bank for the 1-based selector used on the command line
    pub fn from_number(n: u8) -> Option<FmBank> {
        match n {
            1..=5 => Some(Self::ALL[n as usize - 1]),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            FmBank::Melodic => 1,
            FmBank::Intmelo => 2,
            FmBank::Hammelo => 3,
            FmBank::Rickmelo => 4,
            FmBank::D2Melod => 5,
        }
    }

    pub fn program_map(&self) -> &'static ProgramMap {
        match self {
            FmBank::Melodic => &MELODIC,
            FmBank::Intmelo => &INTMELO,
            FmBank::Hammelo => &HAMMELO,
            FmBank::Rickmelo => &RICKMELO,
            FmBank::D2Melod => &D2MELOD,
        }
    }

    /// Melodic and drum bank file names the song file must reference
    pub fn bank_files(&self) -> (&'static str, &'static str) {
        match self {
            FmBank::Melodic => ("MELODIC.BNK", "DRUM.BNK"),
            FmBank::Intmelo => ("INTMELO.BNK", "INTDRUM.BNK"),
            FmBank::Hammelo => ("HAMMELO.BNK", "HAMDRUM.BNK"),
            FmBank::Rickmelo => ("RICKMELO.BNK", "RICKDRUM.BNK"),
            FmBank::D2Melod => ("D2MELOD.BNK", "D2DRUMS.BNK"),
        }
    }
}

impl fmt::Display for FmBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (melodic, drums) = self.bank_files();
        write!(f, "{}/{}", melodic, drums)
    }
}
