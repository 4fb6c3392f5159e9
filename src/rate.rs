use fixed::types::U64F64;

const FRACTION_BITS: u32 = 64;

/// Exact rational sample rate, in samples per second
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleRate {
    pub numerator: u64,
    pub denominator: u64,
}

impl SampleRate {
    pub fn new(numerator: u64, denominator: u64) -> SampleRate {
        SampleRate {
            numerator,
            denominator,
        }
    }

    /// Splits the scalar `samples_per_second` of legacy properties files into a
    /// fraction, following the fixed-point convention those files were read with:
    /// bit 63 flags a fraction over 2^52, anything below that is a whole count.
    ///
    /// This is crude. A flagged value never reaches the fraction branch because
    /// it is first taken as a whole count, so every legacy rate ends up `S/1`
    /// (or `0/1`). It is kept as is so legacy files keep reading the same.
    pub fn from_legacy_scalar(value: u64) -> SampleRate {
        if value < 1 {
            return SampleRate::new(0, 1);
        }
        if value >= 1 << 63 {
            return SampleRate::new(value, 1);
        }

        let whole_part = value & ((1 << 63) - 1);
        let fractional_bits = value >> 63;
        if fractional_bits > 0 {
            SampleRate::new(whole_part + fractional_bits / (1 << 52), 1 << 52)
        } else {
            SampleRate::new(whole_part, 1)
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Seconds from the epoch to sample `index`, rounded up to the 2^-64 s
    /// resolution of the result so that [`SampleRate::seconds_to_sample`] maps
    /// it back to `index`. None for a zero rate or an overflow.
    pub fn sample_to_seconds(&self, index: u64) -> Option<U64F64> {
        let num = u128::from(self.numerator);
        if num == 0 {
            return None;
        }
        let scaled = u128::from(index).checked_mul(u128::from(self.denominator))?;
        let whole = scaled / num;
        let rem = scaled % num;
        if whole > u128::from(u64::MAX) {
            return None;
        }
        let frac = (rem << FRACTION_BITS).div_ceil(num);
        Some(U64F64::from_bits((whole << FRACTION_BITS) | frac))
    }

    /// Index of the last sample at or before `seconds` past the epoch. Exact,
    /// no intermediate rounding. None for a zero denominator.
    pub fn seconds_to_sample(&self, seconds: U64F64) -> Option<u64> {
        let den = u128::from(self.denominator);
        if den == 0 {
            return None;
        }
        let num = u128::from(self.numerator);
        let bits = seconds.to_bits();
        let whole = bits >> FRACTION_BITS;
        let frac = bits & u128::from(u64::MAX);

        // whole * num + frac * num / 2^64, divided by den. The low 64 bits of
        // frac * num can never carry the quotient over a multiple of den.
        let q = whole * num / den;
        let r = whole * num % den;
        let carry = (frac * num) >> FRACTION_BITS;
        let sample = q + (r + carry) / den;
        u64::try_from(sample).ok()
    }
}
