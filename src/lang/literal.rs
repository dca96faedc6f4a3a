use std::fmt;

/// Runtime word of the stack machine.
pub type Word = i32;

/// A numeric literal with this many bits or more (sign included) does not fit.
pub const MAX_LITERAL_BITS: usize = 32;

/// One bit of a literal: a space is 0, a tab is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bit {
    Space,
    Tab,
}

impl Bit {
    pub fn byte(self) -> u8 {
        match self {
            Bit::Space => b' ',
            Bit::Tab => b'\t',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("literal uses {bits} bits, at most {max} allowed", max = MAX_LITERAL_BITS - 1)]
pub struct LiteralOverflow {
    pub bits: usize,
}

/// Raw space/tab sequence of a literal, as read up to its terminating linefeed.
///
/// Numbers read the first bit as the sign and the rest as the magnitude,
/// most-significant first. Labels use the whole sequence as an opaque key.
/// `Display` renders the bits as `s`/`t`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitString(Vec<Bit>);

impl BitString {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, bit: Bit) {
        self.0.push(bit);
    }

    pub fn bits(&self) -> &[Bit] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes a sign + magnitude number. An empty literal is zero.
    pub fn decode_number(&self) -> Result<Word, LiteralOverflow> {
        if self.len() >= MAX_LITERAL_BITS {
            return Err(LiteralOverflow { bits: self.len() });
        }

        let Some((sign, magnitude)) = self.0.split_first() else {
            return Ok(0);
        };

        let value = magnitude
            .iter()
            .fold(0 as Word, |acc, bit| (acc << 1) | Word::from(*bit == Bit::Tab));

        Ok(match sign {
            Bit::Space => value,
            Bit::Tab => -value,
        })
    }

    /// Shortest sign + magnitude encoding of `n`.
    pub fn from_number(n: Word) -> Self {
        let mut bits = vec![if n < 0 { Bit::Tab } else { Bit::Space }];
        let magnitude = n.unsigned_abs();

        if magnitude != 0 {
            let width = u32::BITS - magnitude.leading_zeros();
            for shift in (0..width).rev() {
                bits.push(if (magnitude >> shift) & 1 == 1 {
                    Bit::Tab
                } else {
                    Bit::Space
                });
            }
        }

        Self(bits)
    }

    /// Parses the `s`/`t` rendering produced by `Display`.
    pub fn from_label_name(name: &str) -> Option<Self> {
        name.chars()
            .map(|c| match c {
                's' => Some(Bit::Space),
                't' => Some(Bit::Tab),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }
}

impl FromIterator<Bit> for BitString {
    fn from_iter<I: IntoIterator<Item = Bit>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.0 {
            f.write_str(match bit {
                Bit::Space => "s",
                Bit::Tab => "t",
            })?;
        }
        Ok(())
    }
}
