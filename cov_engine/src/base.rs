use std::{fmt, str::FromStr};

/// Genomic coordinate (1-based)
pub type Pos = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub const ALL: [Strand; 2] = [Strand::Forward, Strand::Reverse];

    #[inline]
    pub fn idx(self) -> usize {
        self as usize
    }
}

impl FromStr for Strand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "F" | "f" => Ok(Self::Forward),
            "-" | "R" | "r" => Ok(Self::Reverse),
            _ => Err(anyhow!("Could not parse {} as strand", s)),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "+",
            Self::Reverse => "-",
        })
    }
}

/// Classification assigned to an alignment by the aligner
///
/// Perfect - unique hit without mismatches
/// Best - best hit among several candidate locations
/// Other - anything else
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Perfect,
    Best,
    Other,
}

pub const N_CLASSES: usize = 3;

impl Classification {
    pub const ALL: [Classification; N_CLASSES] = [
        Classification::Perfect,
        Classification::Best,
        Classification::Other,
    ];

    #[inline]
    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Perfect => "perfect",
            Self::Best => "best",
            Self::Other => "other",
        }
    }
}

impl FromStr for Classification {
    type Err = anyhow::Error;

    // Accepts any non-empty prefix of the name, case insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        if s.is_empty() {
            return Err(anyhow!("Empty classification"));
        }
        Self::ALL
            .iter()
            .find(|c| c.name().starts_with(&s))
            .copied()
            .ok_or_else(|| anyhow!("Could not parse classification {}", s))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base observed in a read at a reference position.  Gap is a deletion
/// in the read relative to the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    A,
    C,
    G,
    T,
    N,
    Gap,
}

pub const N_BASES: usize = 6;

impl Base {
    pub const ALL: [Base; N_BASES] = [Base::A, Base::C, Base::G, Base::T, Base::N, Base::Gap];

    #[inline]
    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn from_byte(c: u8) -> Option<Self> {
        match c {
            b'A' | b'a' => Some(Self::A),
            b'C' | b'c' => Some(Self::C),
            b'G' | b'g' => Some(Self::G),
            b'T' | b't' => Some(Self::T),
            b'N' | b'n' => Some(Self::N),
            b'-' | b'*' => Some(Self::Gap),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::G => 'G',
            Self::T => 'T',
            Self::N => 'N',
            Self::Gap => '-',
        }
    }
}

impl FromStr for Base {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [c] => Base::from_byte(*c).ok_or_else(|| anyhow!("Illegal base {}", s)),
            _ => Err(anyhow!("Illegal base {}", s)),
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_prefixes() {
        assert_eq!("P".parse::<Classification>().unwrap(), Classification::Perfect);
        assert_eq!("best".parse::<Classification>().unwrap(), Classification::Best);
        assert_eq!("oth".parse::<Classification>().unwrap(), Classification::Other);
        assert!("".parse::<Classification>().is_err());
        assert!("bestest".parse::<Classification>().is_err());
    }

    #[test]
    fn bases() {
        assert_eq!("g".parse::<Base>().unwrap(), Base::G);
        assert_eq!("-".parse::<Base>().unwrap(), Base::Gap);
        assert!("GA".parse::<Base>().is_err());
        assert!("X".parse::<Base>().is_err());
        for (i, b) in Base::ALL.iter().enumerate() {
            assert_eq!(b.idx(), i);
            assert_eq!(Base::from_byte(b.as_char() as u8), Some(*b));
        }
    }

    #[test]
    fn strands() {
        assert_eq!("+".parse::<Strand>().unwrap(), Strand::Forward);
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Reverse);
        assert!("?".parse::<Strand>().is_err());
        assert_eq!(Strand::Reverse.to_string(), "-");
    }
}
