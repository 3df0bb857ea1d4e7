/// Gradient ("improved Perlin") noise over ℝ².
///
/// The 256-entry permutation table is stored twice so that lattice lookups
/// `perm[perm[x] + y + 1]` never need to wrap.
#[derive(Clone)]
pub struct Perlin {
    perm: [u8; 512],
}

/// Park–Miller minimal-standard generator constants.
const LEHMER_MULTIPLIER: u64 = 16_807;
const LEHMER_MODULUS: u64 = 2_147_483_647;

impl Perlin {
    /// The fixed table shared by every generator that does not ask for a seed.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Build a table by Fisher–Yates shuffling `0..=255` with a Lehmer
    /// sequence started from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let mut table: [u8; 256] = std::array::from_fn(|i| i as u8);
        let mut state = seed % LEHMER_MODULUS;
        if state == 0 {
            state = 1;
        }
        for i in (1..256usize).rev() {
            state = state * LEHMER_MULTIPLIER % LEHMER_MODULUS;
            let j = (state % (i as u64 + 1)) as usize;
            table.swap(i, j);
        }
        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&table);
        perm[256..].copy_from_slice(&table);
        Self { perm }
    }

    /// Noise at `(x, y)`, in `[-1, 1]`. Integer lattice points return 0.
    pub fn noise(&self, x: f64, y: f64) -> f64 {
        if !x.is_finite() || !y.is_finite() {
            return 0.0;
        }
        let x_floor = x.floor();
        let y_floor = y.floor();
        let xi = (x_floor as i64 & 255) as usize;
        let yi = (y_floor as i64 & 255) as usize;
        let xf = x - x_floor;
        let yf = y - y_floor;

        let u = fade(xf);
        let v = fade(yf);

        let p = &self.perm;
        let aa = p[p[xi] as usize + yi];
        let ab = p[p[xi] as usize + yi + 1];
        let ba = p[p[xi + 1] as usize + yi];
        let bb = p[p[xi + 1] as usize + yi + 1];

        let x1 = lerp(u, grad(aa, xf, yf), grad(ba, xf - 1.0, yf));
        let x2 = lerp(u, grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0));
        lerp(v, x1, x2).clamp(-1.0, 1.0)
    }

    /// Fractal sum of `octaves` noise samples at doubling frequency, each
    /// weighted by `persistence` times the previous weight, normalised by the
    /// total weight so the result stays in `[-1, 1]`.
    ///
    /// Zero octaves yields 0.
    pub fn octave_noise(&self, x: f64, y: f64, octaves: u32, persistence: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves {
            value += self.noise(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        if max_value > 0.0 {
            value / max_value
        } else {
            0.0
        }
    }
}

impl Default for Perlin {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Perlin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Perlin")
            .field("perm", &&self.perm[..8])
            .finish_non_exhaustive()
    }
}

/// Default persistence for [`Perlin::octave_noise`].
pub const DEFAULT_PERSISTENCE: f64 = 0.5;

/// Quintic smoothstep `6t⁵ − 15t⁴ + 10t³`.
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
fn grad(hash: u8, x: f64, y: f64) -> f64 {
    let h = hash & 15;
    let (u, v) = if h < 8 { (x, y) } else { (y, x) };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_bit_deterministic() {
        let p = Perlin::new();
        let a = p.noise(1.5, 2.5);
        let b = p.noise(1.5, 2.5);
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(
            Perlin::new().noise(0.3, 7.9).to_bits(),
            Perlin::new().noise(0.3, 7.9).to_bits()
        );
    }

    #[test]
    fn single_octave_is_base_noise() {
        let p = Perlin::new();
        for &(x, y) in &[(1.5, 2.5), (0.1, 0.9), (13.37, -4.2), (-7.25, 3.75)] {
            assert_eq!(
                p.octave_noise(x, y, 1, DEFAULT_PERSISTENCE).to_bits(),
                p.noise(x, y).to_bits()
            );
        }
    }

    #[test]
    fn lattice_points_are_zero() {
        let p = Perlin::new();
        assert_eq!(p.noise(3.0, 4.0), 0.0);
        assert_eq!(p.noise(-12.0, 0.0), 0.0);
    }

    #[test]
    fn values_stay_in_range() {
        let p = Perlin::with_seed(42);
        for i in 0..2000 {
            let x = i as f64 * 0.137 - 50.0;
            let y = i as f64 * 0.291 + 11.0;
            let n = p.noise(x, y);
            assert!((-1.0..=1.0).contains(&n));
            let o = p.octave_noise(x, y, 6, DEFAULT_PERSISTENCE);
            assert!((-1.0..=1.0).contains(&o));
        }
    }

    #[test]
    fn seeds_change_the_field() {
        let a = Perlin::with_seed(1);
        let b = Perlin::with_seed(2);
        let differs = (0..50).any(|i| {
            let x = i as f64 * 0.37 + 0.5;
            a.noise(x, x * 0.5) != b.noise(x, x * 0.5)
        });
        assert!(differs);
    }

    #[test]
    fn zero_octaves_and_non_finite_input_are_zero() {
        let p = Perlin::new();
        assert_eq!(p.octave_noise(1.5, 2.5, 0, 0.5), 0.0);
        assert_eq!(p.noise(f64::NAN, 1.0), 0.0);
        assert_eq!(p.noise(1.0, f64::INFINITY), 0.0);
    }
}
