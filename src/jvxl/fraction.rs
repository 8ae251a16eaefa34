use crate::types::Value;

pub const DEFAULT_BASE: u8 = 35;
pub const DEFAULT_RANGE: u8 = 90;

/// Backslash would need escaping in quoted contexts, so it travels as `!`.
const BACKSLASH: u32 = 92;
const BACKSLASH_STANDIN: u32 = 33;

/// Largest fraction the two-character form stores.
const PRECISE_CLAMP: Value = 0.9999;
/// Pushes the coarse digit to `range`, which decodes as NaN.
const PRECISE_NAN: Value = 1.0001;

fn to_char(code: u32) -> char {
    let code = if code == BACKSLASH { BACKSLASH_STANDIN } else { code };
    char::from_u32(code).unwrap_or('?')
}

fn from_char(c: char) -> u32 {
    let code = c as u32;
    if code == BACKSLASH_STANDIN { BACKSLASH } else { code }
}

/// Encodes one fraction in `[0, 1]` as a single printable character.
///
/// ```text
/// char = round(clamp(f, 0, 1) · range) + base      NaN -> base + range + 1
/// ```
pub fn fraction_to_char(fraction: Value, base: u8, range: u8) -> char {
    let code = if fraction.is_nan() {
        base as u32 + range as u32 + 1
    } else {
        (fraction.clamp(0.0, 1.0) * range as Value).round() as u32 + base as u32
    };
    to_char(code)
}

/// Inverse of [`fraction_to_char`].
pub fn char_to_fraction(c: char, base: u8, range: u8) -> Value {
    let code = from_char(c);
    if code == base as u32 + range as u32 + 1 {
        return Value::NAN;
    }
    let steps = code.saturating_sub(base as u32).min(range as u32);
    steps as Value / range as Value
}

/// Character set used for one kind of data in a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FractionCodec {
    pub base: u8,
    pub range: u8,
}

impl Default for FractionCodec {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            range: DEFAULT_RANGE,
        }
    }
}

impl FractionCodec {
    pub fn new(base: u8, range: u8) -> Self {
        Self { base, range }
    }

    pub fn encode(&self, fraction: Value) -> char {
        fraction_to_char(fraction, self.base, self.range)
    }

    pub fn decode(&self, c: char) -> Value {
        char_to_fraction(c, self.base, self.range)
    }

    /// Coarse and remainder digits of a fraction, each below `range` except
    /// for NaN, whose coarse digit is `range` itself.
    fn precise_digits(&self, fraction: Value) -> (u32, u32) {
        let f = if fraction.is_nan() {
            PRECISE_NAN
        } else {
            fraction.clamp(0.0, PRECISE_CLAMP)
        };
        let scaled = f * self.range as Value;
        let hi = scaled.floor();
        let lo = ((scaled - hi) * self.range as Value).floor();
        (hi as u32, lo as u32)
    }

    /// Two-character form: every coarse character first, then every remainder.
    pub fn encode_precise<I>(&self, fractions: I) -> String
    where
        I: IntoIterator<Item = Value>,
    {
        let base = self.base as u32;
        let (hi, lo): (String, String) = fractions
            .into_iter()
            .map(|f| {
                let (hi, lo) = self.precise_digits(f);
                (to_char(base + hi), to_char(base + lo))
            })
            .unzip();
        hi + &lo
    }

    /// Inverse of [`encode_precise`](Self::encode_precise); an odd trailing character is ignored.
    pub fn decode_precise(&self, chars: &[char]) -> Vec<Value> {
        let n = chars.len() / 2;
        let base = self.base as u32;
        let range = self.range as Value;
        chars[..n]
            .iter()
            .zip(&chars[n..2 * n])
            .map(|(&hi, &lo)| {
                let hi = from_char(hi).saturating_sub(base);
                if hi >= self.range as u32 {
                    return Value::NAN;
                }
                let lo = from_char(lo).saturating_sub(base) as Value;
                (hi as Value + lo / range) / range
            })
            .collect()
    }
}

/// Position of `value` within `min..=max`; NaN stays NaN.
pub(crate) fn to_fraction(value: Value, (min, max): (Value, Value)) -> Value {
    if value.is_nan() {
        Value::NAN
    } else if max > min {
        (value - min) / (max - min)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn known_characters() {
        assert_eq!(fraction_to_char(0.37, 35, 90), 'D');
        assert_eq!(fraction_to_char(0.0, 35, 90), '#');
        assert_eq!(fraction_to_char(1.0, 35, 90), '}');
        assert_eq!(fraction_to_char(Value::NAN, 35, 90), '~');
        assert!(char_to_fraction('~', 35, 90).is_nan());
    }

    #[test]
    fn backslash_never_appears() {
        // 57/90 lands on code 92.
        let c = fraction_to_char(57.0 / 90.0, 35, 90);
        assert_eq!(c, '!');
        assert_relative_eq!(char_to_fraction(c, 35, 90), 57.0 / 90.0);
    }

    #[test]
    fn out_of_range_fractions_clamp() {
        assert_eq!(fraction_to_char(-0.5, 35, 90), '#');
        assert_eq!(fraction_to_char(7.0, 35, 90), '}');
    }

    #[test]
    fn precise_pairs_hold_two_digits() {
        let codec = FractionCodec::default();
        let encoded = codec.encode_precise([0.123456, 1.0, Value::NAN, 0.0]);
        assert_eq!(encoded.len(), 8);
        let chars: Vec<char> = encoded.chars().collect();
        let decoded = codec.decode_precise(&chars);
        assert!((decoded[0] - 0.123456).abs() < 2.0 / 8100.0);
        assert!((decoded[1] - PRECISE_CLAMP).abs() < 2.0 / 8100.0);
        assert!(decoded[2].is_nan());
        assert_relative_eq!(decoded[3], 0.0);
        assert!(!encoded.contains('\\'));
    }

    #[test]
    fn fraction_of_empty_range_is_zero() {
        assert_relative_eq!(to_fraction(3.0, (3.0, 3.0)), 0.0);
        assert_relative_eq!(to_fraction(2.0, (1.0, 5.0)), 0.25);
        assert!(to_fraction(Value::NAN, (0.0, 1.0)).is_nan());
    }
}
