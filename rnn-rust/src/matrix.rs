// ============================================================================
// DENSE ROW-MAJOR MATRICES + SIMD-FRIENDLY VECTOR OPERATIONS
// These tight loops auto-vectorize with rustc -C opt-level=3 + LTO
// ============================================================================

use rand::Rng;

use crate::error::{Result, RnnError};

#[inline]
pub fn vec_add_inplace(a: &mut [f64], b: &[f64]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b.iter()) { *x += y; }
}

#[inline]
pub fn vec_tanh(a: &[f64]) -> Vec<f64> {
    a.iter().map(|&x| x.tanh()).collect()
}

/// Elementwise `a * (1 - s^2)`, the tanh derivative expressed through its output.
#[inline]
pub fn vec_tanh_backward(a: &[f64], s: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), s.len());
    a.iter().zip(s.iter()).map(|(d, s)| d * (1.0 - s * s)).collect()
}

#[inline]
pub fn vec_max(a: &[f64]) -> f64 {
    a.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}

/// Max-shifted softmax; the shift keeps `exp` from overflowing.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let mx = vec_max(logits);
    let ex: Vec<f64> = logits.iter().map(|l| (l - mx).exp()).collect();
    let sm: f64 = ex.iter().sum();
    ex.iter().map(|e| e / sm).collect()
}

/// Index of the largest entry; the first one wins ties.
pub fn argmax(a: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in a.iter().enumerate() {
        if v > a[best] { best = i; }
    }
    best
}

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Independent draws from `[-bound, bound]`.
    pub fn uniform(rows: usize, cols: usize, bound: f64, rng: &mut impl Rng) -> Self {
        let data = (0..rows * cols).map(|_| rng.gen_range(-bound..=bound)).collect();
        Matrix { rows, cols, data }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(RnnError::ShapeMismatch(format!(
                "{} values cannot fill a {}x{} matrix",
                data.len(), rows, cols
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    pub fn shape(&self) -> (usize, usize) { (self.rows, self.cols) }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 { self.data[r * self.cols + c] }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: f64) { self.data[r * self.cols + c] = v; }

    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, c)).collect()
    }

    /// `self · x`
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.cols, "matvec shape [{},{}] @ [{}]", self.rows, self.cols, x.len());
        let mut out = vec![0.0f64; self.rows];
        if self.rows == 0 || self.cols == 0 { return out; }
        // BLAS-quality gemm via matrixmultiply crate, x as a [cols, 1] column
        unsafe {
            matrixmultiply::dgemm(
                self.rows, self.cols, 1,
                1.0,
                self.data.as_ptr(), self.cols as isize, 1, // A: row-major [rows, cols]
                x.as_ptr(), 1, 1,                          // B: [cols, 1]
                0.0,
                out.as_mut_ptr(), 1, 1,                    // C: [rows, 1]
            );
        }
        out
    }

    /// `selfᵀ · x`, read through swapped strides instead of a transposed copy.
    pub fn matvec_t(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.rows, "matvec_t shape [{},{}]ᵀ @ [{}]", self.rows, self.cols, x.len());
        let mut out = vec![0.0f64; self.cols];
        if self.rows == 0 || self.cols == 0 { return out; }
        unsafe {
            matrixmultiply::dgemm(
                self.cols, self.rows, 1,
                1.0,
                self.data.as_ptr(), 1, self.cols as isize, // Aᵀ: [cols, rows]
                x.as_ptr(), 1, 1,
                0.0,
                out.as_mut_ptr(), 1, 1,
            );
        }
        out
    }

    /// `self += a ⊗ b`
    pub fn add_outer(&mut self, a: &[f64], b: &[f64]) {
        debug_assert_eq!(a.len(), self.rows);
        debug_assert_eq!(b.len(), self.cols);
        if self.cols == 0 { return; }
        for (row, &ai) in self.data.chunks_exact_mut(self.cols).zip(a.iter()) {
            for (x, &bj) in row.iter_mut().zip(b.iter()) { *x += ai * bj; }
        }
    }

    pub fn add_to_column(&mut self, c: usize, v: &[f64]) {
        debug_assert_eq!(v.len(), self.rows);
        for (r, &x) in v.iter().enumerate() { self.data[r * self.cols + c] += x; }
    }

    /// `self += s * other`
    pub fn scaled_add(&mut self, other: &Matrix, s: f64) {
        debug_assert_eq!(self.shape(), other.shape());
        for (x, y) in self.data.iter_mut().zip(other.data.iter()) { *x += s * y; }
    }

    pub fn is_finite(&self) -> bool { self.data.iter().all(|x| x.is_finite()) }
}
