//! Tri-valued bit primitives and input-combination expansion.
//!
//! Everything in the consistency engine that talks about "a bit" means a
//! [`Bit`], not a `bool`: saved diagrams routinely leave cells blank, mark
//! them don't-care, or encode a concrete `0`/`1`. Keeping `Unspecified`
//! distinct from `DontCare` matters — a blank cell is not matchable, while an
//! explicit `X` matches anything.

use std::fmt;

/// A single tri-valued (plus "blank") bit as it appears in a saved diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bit {
    Zero,
    One,
    /// Explicit `X`: unconstrained, matches anything.
    DontCare,
    /// The user left the cell blank. Distinct from `DontCare` — not matchable.
    Unspecified,
}

impl Bit {
    /// Accepts any scalar-ish string, upper-cases it, and takes the first
    /// character in `{0,1,X}`. Anything else (including empty) is `Unspecified`.
    pub fn normalize(raw: &str) -> Bit {
        let trimmed = raw.trim().to_uppercase();
        match trimmed.chars().next() {
            Some('0') => Bit::Zero,
            Some('1') => Bit::One,
            Some('X') => Bit::DontCare,
            _ => Bit::Unspecified,
        }
    }

    /// `true` for `Zero`/`One`/`DontCare` — i.e. the cell was given *some*
    /// explicit value. `Unspecified` (blank) is never concrete.
    pub fn is_specified(self) -> bool {
        !matches!(self, Bit::Unspecified)
    }

    pub fn is_concrete(self) -> bool {
        matches!(self, Bit::Zero | Bit::One)
    }

    pub fn to_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
            Bit::DontCare => 'X',
            Bit::Unspecified => '\0',
        }
    }

    pub fn from_char(c: char) -> Bit {
        match c {
            '0' => Bit::Zero,
            '1' => Bit::One,
            'X' | 'x' => Bit::DontCare,
            _ => Bit::Unspecified,
        }
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bit::Unspecified => write!(f, ""),
            other => write!(f, "{}", other.to_char()),
        }
    }
}

/// Pad or trim a sequence of raw values to exactly `expected_length` bits.
/// Positions beyond the input are `Unspecified`.
pub fn normalize_bit_array(values: &[String], expected_length: usize) -> Vec<Bit> {
    let mut result = vec![Bit::Unspecified; expected_length];
    for (idx, val) in values.iter().enumerate() {
        if idx < expected_length {
            result[idx] = Bit::normalize(val);
        }
    }
    result
}

/// Expand a bit-pattern containing don't-cares (and blanks, treated as
/// don't-cares here) into its concrete `{0,1}` completions.
///
/// Order: for each don't-care slot, `0` before `1`; the leftmost varying slot
/// varies slowest. Returns `2^k` strings of the same length as `values`,
/// where `k` is the number of don't-care/unspecified positions.
pub fn combinations_from(values: &[Bit]) -> Vec<String> {
    let mut combos: Vec<String> = vec![String::new()];
    for &bit in values {
        let is_wild = matches!(bit, Bit::DontCare | Bit::Unspecified);
        let mut next = Vec::with_capacity(combos.len() * if is_wild { 2 } else { 1 });
        for prefix in &combos {
            if is_wild {
                next.push(format!("{prefix}0"));
                next.push(format!("{prefix}1"));
            } else {
                next.push(format!("{prefix}{}", bit.to_char()));
            }
        }
        combos = next;
    }
    combos
}

/// All `2^n` combinations of `n` bits, in ascending numeric order,
/// left-padded to width `n`. `generate_all_combos(0) == [""]`.
pub fn generate_all_combos(n: usize) -> Vec<String> {
    if n == 0 {
        return vec![String::new()];
    }
    let total = 1usize << n;
    (0..total).map(|i| format!("{:0width$b}", i, width = n)).collect()
}

/// Minimum bit width needed to encode `n` states: `max(1, ceil(log2(max(n,1))))`.
pub fn state_bit_width(n: usize) -> usize {
    let n = n.max(1);
    if n <= 1 {
        return 1;
    }
    let mut bits = 0usize;
    let mut cap = 1usize;
    while cap < n {
        cap <<= 1;
        bits += 1;
    }
    bits.max(1)
}

/// Canonical binary encoding for a state: strip to `{0,1}`, right-justify to
/// `width`, take the last `width` characters. Falls back to the binary
/// encoding of `id` when the stored `binary` string has no usable digits.
pub fn state_binary_code(binary: &str, id: i64, width: usize) -> String {
    let digits: String = binary.chars().filter(|c| *c == '0' || *c == '1').collect();
    let digits = if digits.is_empty() {
        format!("{:b}", id.max(0))
    } else {
        digits
    };
    let padded = if digits.len() < width {
        format!("{}{}", "0".repeat(width - digits.len()), digits)
    } else {
        digits
    };
    padded[padded.len() - width..].to_string()
}

/// Wildcard-aware match of two single bit characters: equal iff either side
/// is `X` or the two agree. Neither side may be blank.
pub fn values_compatible(expected: Bit, actual: Bit) -> bool {
    if !expected.is_specified() || !actual.is_specified() {
        return false;
    }
    if expected == Bit::DontCare || actual == Bit::DontCare {
        return true;
    }
    expected == actual
}

/// Moore-style wildcard match across two equal-length bit arrays.
pub fn arrays_compatible(expected: &[Bit], actual: &[Bit]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual.iter())
            .all(|(e, a)| values_compatible(*e, *a))
}

/// Mealy output match: strict positional equality, `X` only matches `X`.
pub fn mealy_outputs_compatible(expected: &[Bit], actual: &[Bit]) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    for (&e, &a) in expected.iter().zip(actual.iter()) {
        if !e.is_specified() || !a.is_specified() {
            return false;
        }
        if e == Bit::DontCare || a == Bit::DontCare {
            if e != a {
                return false;
            }
            continue;
        }
        if e != a {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bit() {
        assert_eq!(Bit::normalize("0"), Bit::Zero);
        assert_eq!(Bit::normalize("1"), Bit::One);
        assert_eq!(Bit::normalize("x"), Bit::DontCare);
        assert_eq!(Bit::normalize(" X "), Bit::DontCare);
        assert_eq!(Bit::normalize(""), Bit::Unspecified);
        assert_eq!(Bit::normalize("garbage"), Bit::Unspecified);
    }

    #[test]
    fn test_combinations_from_no_wildcards() {
        let values = vec![Bit::One, Bit::Zero];
        assert_eq!(combinations_from(&values), vec!["10".to_string()]);
    }

    #[test]
    fn test_combinations_from_law() {
        // |combinations_from(v)| = 2^k, every result same length, leftmost
        // don't-care slot varies slowest.
        let values = vec![Bit::DontCare, Bit::One, Bit::Unspecified];
        let combos = combinations_from(&values);
        assert_eq!(combos.len(), 4);
        assert!(combos.iter().all(|c| c.len() == 3));
        assert_eq!(combos, vec!["010", "011", "110", "111"]);
    }

    #[test]
    fn test_generate_all_combos() {
        assert_eq!(generate_all_combos(0), vec![""]);
        assert_eq!(generate_all_combos(2), vec!["00", "01", "10", "11"]);
    }

    #[test]
    fn test_state_bit_width() {
        assert_eq!(state_bit_width(0), 1);
        assert_eq!(state_bit_width(1), 1);
        assert_eq!(state_bit_width(2), 1);
        assert_eq!(state_bit_width(3), 2);
        assert_eq!(state_bit_width(4), 2);
        assert_eq!(state_bit_width(5), 3);
    }

    #[test]
    fn test_state_binary_code_fallback_to_id() {
        assert_eq!(state_binary_code("", 5, 4), "0101");
    }

    #[test]
    fn test_state_binary_code_strips_and_rjusts() {
        assert_eq!(state_binary_code("1 0", 0, 4), "0010");
        assert_eq!(state_binary_code("10110", 0, 3), "110");
    }

    #[test]
    fn test_values_compatible() {
        assert!(values_compatible(Bit::DontCare, Bit::One));
        assert!(values_compatible(Bit::One, Bit::One));
        assert!(!values_compatible(Bit::One, Bit::Zero));
        assert!(!values_compatible(Bit::Unspecified, Bit::One));
    }

    #[test]
    fn test_mealy_outputs_compatible_strict() {
        assert!(mealy_outputs_compatible(&[Bit::DontCare], &[Bit::DontCare]));
        assert!(!mealy_outputs_compatible(&[Bit::DontCare], &[Bit::One]));
        assert!(mealy_outputs_compatible(&[Bit::One], &[Bit::One]));
    }

    proptest::proptest! {
        /// combination-expansion law: |combinations_from(v)| == 2^k where k is
        /// the number of wildcard slots, every output has the same length as
        /// the input, and every output is compatible with the source pattern.
        #[test]
        fn prop_combinations_from_law(pattern in proptest::collection::vec(0u8..4, 0..8)) {
            let values: Vec<Bit> = pattern
                .iter()
                .map(|n| match n {
                    0 => Bit::Zero,
                    1 => Bit::One,
                    2 => Bit::DontCare,
                    _ => Bit::Unspecified,
                })
                .collect();
            let wild = values
                .iter()
                .filter(|b| matches!(b, Bit::DontCare | Bit::Unspecified))
                .count();
            let combos = combinations_from(&values);
            proptest::prop_assert_eq!(combos.len(), 1usize << wild);
            for combo in &combos {
                proptest::prop_assert_eq!(combo.len(), values.len());
                let actual: Vec<Bit> = combo.chars().map(Bit::from_char).collect();
                for (v, a) in values.iter().zip(actual.iter()) {
                    if v.is_concrete() {
                        proptest::prop_assert_eq!(*v, *a);
                    }
                }
            }
        }
    }
}
