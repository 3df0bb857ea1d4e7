use serde::{Deserialize, Serialize};
use std::ops::Add;

/// A complex number with two `f64` components, kept `Copy` for the
/// escape-time inner loop.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

    #[inline]
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Returns `re² + im²` without taking the square root.
    #[inline]
    pub fn norm_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    /// `z²`, expanded by hand for the escape-time inner loop.
    #[inline]
    pub fn square(self) -> Self {
        Self {
            re: self.re * self.re - self.im * self.im,
            im: 2.0 * self.re * self.im,
        }
    }
}

impl Add for Complex {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn square() {
        // (1 + 2i)² = -3 + 4i
        let z = Complex::new(1.0, 2.0).square();
        assert!(approx_eq(z.re, -3.0));
        assert!(approx_eq(z.im, 4.0));
    }

    #[test]
    fn square_plus_c_is_one_mandelbrot_step() {
        let c = Complex::new(-0.7, 0.27015);
        let z = Complex::ZERO.square() + c;
        assert_eq!(z, c);
        let z = z.square() + c;
        assert!(approx_eq(z.re, 0.49 - 0.27015 * 0.27015 - 0.7));
        assert!(approx_eq(z.im, 2.0 * -0.7 * 0.27015 + 0.27015));
    }

    #[test]
    fn norm_sq() {
        assert!(approx_eq(Complex::new(3.0, 4.0).norm_sq(), 25.0));
    }
}
