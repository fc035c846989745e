//! Last-digit statistics for digit contracts.

use serde::Serialize;

/// Last digit of a quote rendered with `decimals` decimal places.
pub fn last_digit(price: f64, decimals: u32) -> u8 {
    let scaled = (price.abs() * 10f64.powi(decimals as i32)).round();
    (scaled % 10.0) as u8
}

pub fn digit_history(closes: &[f64], decimals: u32) -> Vec<u8> {
    closes.iter().map(|p| last_digit(*p, decimals)).collect()
}

/// Even/odd tally of a digit history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvenOdd {
    pub even: usize,
    pub odd: usize,
}

impl EvenOdd {
    fn total(&self) -> usize {
        self.even + self.odd
    }

    /// Share of even digits; 0.5 when empty.
    pub fn even_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.5,
            n => self.even as f64 / n as f64,
        }
    }

    /// Share of odd digits; 0.5 when empty.
    pub fn odd_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.5,
            n => self.odd as f64 / n as f64,
        }
    }
}

pub fn even_odd_counts(digits: &[u8]) -> EvenOdd {
    let even = digits.iter().filter(|d| *d % 2 == 0).count();
    EvenOdd { even, odd: digits.len() - even }
}

/// Relative frequency of each digit 0–9; uniform when empty.
pub fn digit_frequencies(digits: &[u8]) -> [f64; 10] {
    let mut counts = [0usize; 10];
    for d in digits.iter().filter(|d| **d <= 9) {
        counts[*d as usize] += 1;
    }
    let total: usize = counts.iter().sum();
    if total == 0 {
        return [0.1; 10];
    }
    counts.map(|c| c as f64 / total as f64)
}

/// Empirical probability of `target` appearing; 0.1 with no history.
pub fn digit_probability(digits: &[u8], target: u8) -> f64 {
    if target > 9 {
        return 0.0;
    }
    digit_frequencies(digits)[target as usize]
}
