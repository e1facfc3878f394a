use rand::Rng;

use crate::error::GeneratorError;

/// Characters drawn by default. The mix covers one-unit ASCII, a one-unit
/// non-ASCII letter, line breaks, and two-unit characters outside the BMP.
pub const DEFAULT_ALPHABET: &[char] = &[
    'a', 'b', 'c', 'x', 'y', 'z', ' ', '\n', 'ä', '🥕', '💚', '𠜎',
];

/// Produces random strings whose UTF-16 length is exactly the requested one.
#[derive(Debug, Clone)]
pub struct RandomTextGenerator {
    alphabet: Vec<char>,
}

impl RandomTextGenerator {
    pub fn new(alphabet: impl Into<Vec<char>>) -> Result<Self, GeneratorError> {
        let alphabet = alphabet.into();
        if !alphabet.iter().any(|c| c.len_utf16() == 1) {
            return Err(GeneratorError::NoUnitWidthChar);
        }

        Ok(Self { alphabet })
    }

    /// Characters that would overshoot the remaining budget are rejected and
    /// redrawn, so a wide character is never cut in half.
    pub fn generate<R: Rng>(&self, rng: &mut R, target_len: usize) -> String {
        let mut ans = String::new();
        if target_len == 0 {
            return ans;
        }

        let mut len = 0;
        while len < target_len {
            let c = self.alphabet[rng.gen_range(0..self.alphabet.len())];
            let width = c.len_utf16();
            if len + width > target_len {
                continue;
            }

            ans.push(c);
            len += width;
        }

        ans
    }
}

impl Default for RandomTextGenerator {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.to_vec(),
        }
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::utf16::get_utf16_len;

    #[test]
    fn empty_target() {
        let gen = RandomTextGenerator::default();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(gen.generate(&mut rng, 0), "");
    }

    #[test]
    fn exact_len() {
        let gen = RandomTextGenerator::default();
        let mut rng = StdRng::seed_from_u64(42);
        for n in 0..200 {
            let s = gen.generate(&mut rng, n);
            assert_eq!(get_utf16_len(&s), n, "{s:?}");
        }
    }

    #[test]
    fn wide_char_never_split() {
        let gen = RandomTextGenerator::new(vec!['🥕', 'a']).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen_wide = false;
        let mut seen_narrow = false;
        for _ in 0..500 {
            let s = gen.generate(&mut rng, 2);
            assert_eq!(get_utf16_len(&s), 2);
            match s.as_str() {
                "🥕" => seen_wide = true,
                "aa" => seen_narrow = true,
                other => unreachable!("unexpected output {other:?}"),
            }
        }

        assert!(seen_wide);
        assert!(seen_narrow);
    }

    #[test]
    fn reject_alphabet_without_unit_char() {
        assert!(RandomTextGenerator::new(vec!['🥕', '💚']).is_err());
        assert!(RandomTextGenerator::new(Vec::<char>::new()).is_err());
    }

    #[test]
    fn arb_exact_len() {
        arbtest::arbtest(|u| {
            let seed: u64 = u.arbitrary()?;
            let target: usize = u.int_in_range(0..=64)?;
            let gen = RandomTextGenerator::default();
            let mut rng = StdRng::seed_from_u64(seed);
            let s = gen.generate(&mut rng, target);
            assert_eq!(get_utf16_len(&s), target);
            Ok(())
        });
    }
}
