use std::f32::consts::PI;

use thiserror::Error;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Complex32 {
    pub(crate) re: f32,
    pub(crate) im: f32,
}

impl Complex32 {
    pub(crate) fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    fn mul(self, other: Self) -> Self {
        Self {
            re: self.re * other.re - self.im * other.im,
            im: self.re * other.im + self.im * other.re,
        }
    }

    fn add(self, other: Self) -> Self {
        Self {
            re: self.re + other.re,
            im: self.im + other.im,
        }
    }

    fn sub(self, other: Self) -> Self {
        Self {
            re: self.re - other.re,
            im: self.im - other.im,
        }
    }

    pub(crate) fn norm_sqr(self) -> f32 {
        (self.re * self.re + self.im * self.im).max(0.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FftError {
    #[error("FFT length must be a power of two, got {0}")]
    InvalidLength(usize),
    #[error("FFT length mismatch: buffer {buffer}, plan {plan}")]
    LengthMismatch { buffer: usize, plan: usize },
}

/// Symmetric Hann window of `length` points.
pub(crate) fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0_f32; length.max(1)];
    }
    let denom = (length - 1) as f32;
    (0..length)
        .map(|n| 0.5_f32 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
        .collect()
}

/// Precomputed bit-reversal swaps and twiddles for one radix-2 transform size.
///
/// A plan is built once per analysis pass and reused for every STFT frame.
pub(crate) struct FftPlan {
    len: usize,
    bit_swaps: Vec<(usize, usize)>,
    twiddles: Vec<Vec<Complex32>>,
}

impl FftPlan {
    pub(crate) fn new(len: usize) -> Result<Self, FftError> {
        if len == 0 || !len.is_power_of_two() {
            return Err(FftError::InvalidLength(len));
        }
        Ok(Self {
            len,
            bit_swaps: build_bit_swaps(len),
            twiddles: build_twiddle_tables(len),
        })
    }

    /// Forward transform in place.
    pub(crate) fn process(&self, buffer: &mut [Complex32]) -> Result<(), FftError> {
        if buffer.len() != self.len {
            return Err(FftError::LengthMismatch {
                buffer: buffer.len(),
                plan: self.len,
            });
        }
        for &(i, j) in &self.bit_swaps {
            buffer.swap(i, j);
        }
        for stage in &self.twiddles {
            apply_stage(buffer, stage);
        }
        Ok(())
    }
}

fn build_bit_swaps(len: usize) -> Vec<(usize, usize)> {
    let mut swaps = Vec::new();
    let mut j = 0usize;
    for i in 1..len {
        let mut bit = len >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            swaps.push((i, j));
        }
    }
    swaps
}

fn build_twiddle_tables(len: usize) -> Vec<Vec<Complex32>> {
    let mut tables = Vec::new();
    let mut step = 2usize;
    while step <= len {
        let half = step / 2;
        let angle = -2.0_f32 * PI / step as f32;
        let mut stage = Vec::with_capacity(half);
        for i in 0..half {
            let (sin, cos) = (angle * i as f32).sin_cos();
            stage.push(Complex32::new(cos, sin));
        }
        tables.push(stage);
        step *= 2;
    }
    tables
}

fn apply_stage(buffer: &mut [Complex32], twiddles: &[Complex32]) {
    let half = twiddles.len();
    let step = half * 2;
    for start in (0..buffer.len()).step_by(step) {
        for i in 0..half {
            let u = buffer[start + i];
            let v = buffer[start + i + half].mul(twiddles[i]);
            buffer[start + i] = u.add(v);
            buffer[start + i + half] = u.sub(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(input: &[Complex32]) -> Vec<Complex32> {
        let n = input.len();
        (0..n)
            .map(|k| {
                let mut acc = Complex32::default();
                for (t, x) in input.iter().enumerate() {
                    let angle = -2.0 * PI * (k * t) as f32 / n as f32;
                    acc = acc.add(x.mul(Complex32::new(angle.cos(), angle.sin())));
                }
                acc
            })
            .collect()
    }

    #[test]
    fn hann_window_is_symmetric_and_zero_at_edges() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-6);
        assert!(w[7].abs() < 1e-6);
        assert!((w[1] - w[6]).abs() < 1e-6);
    }

    #[test]
    fn plan_rejects_non_power_of_two() {
        assert_eq!(FftPlan::new(12).err(), Some(FftError::InvalidLength(12)));
        assert_eq!(FftPlan::new(0).err(), Some(FftError::InvalidLength(0)));
    }

    #[test]
    fn plan_rejects_mismatched_buffer() {
        let plan = FftPlan::new(8).unwrap();
        let mut buf = vec![Complex32::default(); 4];
        assert!(matches!(
            plan.process(&mut buf),
            Err(FftError::LengthMismatch { buffer: 4, plan: 8 })
        ));
    }

    #[test]
    fn constant_signal_lands_in_dc_bin() {
        let plan = FftPlan::new(8).unwrap();
        let mut buf = vec![Complex32::new(1.0, 0.0); 8];
        plan.process(&mut buf).unwrap();
        assert!((buf[0].re - 8.0).abs() < 1e-4);
        for cell in &buf[1..] {
            assert!(cell.norm_sqr() < 1e-8);
        }
    }

    #[test]
    fn plan_matches_naive_dft() {
        let mut buf = vec![Complex32::default(); 16];
        for (i, cell) in buf.iter_mut().enumerate() {
            cell.re = (i as f32 * 0.25).sin();
        }
        let expected = naive_dft(&buf);
        let plan = FftPlan::new(16).unwrap();
        plan.process(&mut buf).unwrap();
        for (got, want) in buf.iter().zip(expected.iter()) {
            assert!((got.re - want.re).abs() < 1e-3);
            assert!((got.im - want.im).abs() < 1e-3);
        }
    }
}
