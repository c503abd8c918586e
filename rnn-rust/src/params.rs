// ============================================================================
// PARAMETER STORE + CHECKPOINT SERIALIZATION
// ============================================================================

use std::fmt;
use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bptt::Gradients;
use crate::error::{Result, RnnError};
use crate::matrix::Matrix;

/// Names under which the three weight matrices are checkpointed and checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamName { U, V, W }

impl ParamName {
    pub const ALL: [ParamName; 3] = [ParamName::U, ParamName::V, ParamName::W];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamName::U => "U",
            ParamName::V => "V",
            ParamName::W => "W",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        ParamName::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// The recurrent model's weights.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub u: Matrix, // [hidden, word]   input token -> hidden
    pub v: Matrix, // [word, hidden]   hidden -> output logits
    pub w: Matrix, // [hidden, hidden] recurrence
}

impl Params {
    /// Uniform init in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`.
    pub fn new(word_dim: usize, hidden_dim: usize, rng: &mut impl Rng) -> Self {
        let bu = (1.0 / word_dim as f64).sqrt();
        let bh = (1.0 / hidden_dim as f64).sqrt();
        Params {
            u: Matrix::uniform(hidden_dim, word_dim, bu, rng),
            v: Matrix::uniform(word_dim, hidden_dim, bh, rng),
            w: Matrix::uniform(hidden_dim, hidden_dim, bh, rng),
        }
    }

    pub fn from_matrices(u: Matrix, v: Matrix, w: Matrix) -> Result<Self> {
        let p = Params { u, v, w };
        p.validate()?;
        Ok(p)
    }

    pub fn hidden_dim(&self) -> usize { self.u.rows }
    pub fn word_dim(&self) -> usize { self.u.cols }

    pub fn param_count(&self) -> usize {
        self.u.data.len() + self.v.data.len() + self.w.data.len()
    }

    pub fn get(&self, name: ParamName) -> &Matrix {
        match name {
            ParamName::U => &self.u,
            ParamName::V => &self.v,
            ParamName::W => &self.w,
        }
    }

    pub fn get_mut(&mut self, name: ParamName) -> &mut Matrix {
        match name {
            ParamName::U => &mut self.u,
            ParamName::V => &mut self.v,
            ParamName::W => &mut self.w,
        }
    }

    /// All three shapes must agree on `(hidden_dim, word_dim)` as read off `U`.
    pub fn validate(&self) -> Result<()> {
        let (hidden, word) = self.u.shape();
        if self.v.shape() != (word, hidden) {
            return Err(RnnError::ShapeMismatch(format!(
                "V is {}x{} but U ({}x{}) requires {}x{}",
                self.v.rows, self.v.cols, hidden, word, word, hidden
            )));
        }
        if self.w.shape() != (hidden, hidden) {
            return Err(RnnError::ShapeMismatch(format!(
                "W is {}x{} but U ({}x{}) requires {}x{}",
                self.w.rows, self.w.cols, hidden, word, hidden, hidden
            )));
        }
        Ok(())
    }

    /// Plain SGD: `P <- P - lr * dP` for every matrix.
    pub fn apply_gradients(&mut self, grads: &Gradients, learning_rate: f64) {
        self.u.scaled_add(&grads.du, -learning_rate);
        self.v.scaled_add(&grads.dv, -learning_rate);
        self.w.scaled_add(&grads.dw, -learning_rate);
    }

    pub fn save(&self, fp: &Path) -> Result<()> {
        let cp = Checkpoint {
            arrays: ParamName::ALL
                .iter()
                .map(|&name| {
                    let m = self.get(name);
                    NamedArray { name: name.as_str().to_string(), rows: m.rows, cols: m.cols, data: m.data.clone() }
                })
                .collect(),
        };
        let bytes = bincode::serialize(&cp)?;
        fs::write(fp, &bytes)?;
        info!("Saved checkpoint to {} ({:.2} MB)", fp.display(), bytes.len() as f64 / 1_048_576.0);
        Ok(())
    }

    /// Dimensions come from the file, never from the caller.
    pub fn load(fp: &Path) -> Result<Self> {
        let bytes = fs::read(fp)?;
        let cp: Checkpoint = bincode::deserialize(&bytes)?;
        let params = cp.into_params()?;
        info!(
            "Loaded checkpoint from {} (hidden_dim={} word_dim={} params={})",
            fp.display(), params.hidden_dim(), params.word_dim(), params.param_count()
        );
        Ok(params)
    }
}

#[derive(Serialize, Deserialize, Clone)]
struct NamedArray {
    name: String,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Flat container of exactly the arrays `U`, `V`, `W`. No version, no metadata.
#[derive(Serialize, Deserialize, Clone)]
struct Checkpoint {
    arrays: Vec<NamedArray>,
}

impl Checkpoint {
    fn into_params(self) -> Result<Params> {
        let mut slots: [Option<Matrix>; 3] = [None, None, None];
        for arr in self.arrays {
            let name = ParamName::parse(&arr.name)
                .ok_or_else(|| RnnError::Checkpoint(format!("unexpected array {:?}", arr.name)))?;
            let slot = &mut slots[name as usize];
            if slot.is_some() {
                return Err(RnnError::Checkpoint(format!("duplicate array {:?}", arr.name)));
            }
            *slot = Some(Matrix::from_vec(arr.rows, arr.cols, arr.data)?);
        }
        let [u, v, w] = slots;
        let missing = |n: ParamName| RnnError::Checkpoint(format!("missing array {:?}", n.as_str()));
        Params::from_matrices(
            u.ok_or_else(|| missing(ParamName::U))?,
            v.ok_or_else(|| missing(ParamName::V))?,
            w.ok_or_else(|| missing(ParamName::W))?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn write_raw(fp: &Path, arrays: Vec<NamedArray>) {
        let bytes = bincode::serialize(&Checkpoint { arrays }).expect("serialize");
        fs::write(fp, bytes).expect("write");
    }

    fn array(name: &str, rows: usize, cols: usize) -> NamedArray {
        NamedArray { name: name.to_string(), rows, cols, data: vec![0.1; rows * cols] }
    }

    #[test]
    fn init_respects_fan_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = Params::new(16, 4, &mut rng);
        assert_eq!(p.u.shape(), (4, 16));
        assert_eq!(p.v.shape(), (16, 4));
        assert_eq!(p.w.shape(), (4, 4));
        assert!(p.u.data.iter().all(|x| x.abs() <= 0.25));
        assert!(p.v.data.iter().chain(p.w.data.iter()).all(|x| x.abs() <= 0.5));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn save_load_is_exact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fp = dir.path().join("model.bin");
        let mut rng = StdRng::seed_from_u64(1);
        let p = Params::new(5, 3, &mut rng);
        p.save(&fp).expect("save");
        assert_eq!(Params::load(&fp).expect("load"), p);
    }

    #[test]
    fn load_rederives_dimensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fp = dir.path().join("model.bin");
        write_raw(&fp, vec![array("W", 2, 2), array("U", 2, 7), array("V", 7, 2)]);
        let p = Params::load(&fp).expect("load");
        assert_eq!((p.hidden_dim(), p.word_dim()), (2, 7));
    }

    #[test]
    fn load_rejects_disagreeing_hidden_dim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fp = dir.path().join("bad.bin");
        write_raw(&fp, vec![array("U", 3, 5), array("V", 5, 4), array("W", 3, 3)]);
        assert!(matches!(Params::load(&fp), Err(RnnError::ShapeMismatch(_))));
    }

    #[test]
    fn load_rejects_missing_and_duplicate_arrays() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fp = dir.path().join("missing.bin");
        write_raw(&fp, vec![array("U", 3, 5), array("V", 5, 3)]);
        assert!(matches!(Params::load(&fp), Err(RnnError::Checkpoint(_))));

        write_raw(&fp, vec![array("U", 3, 5), array("U", 3, 5), array("V", 5, 3), array("W", 3, 3)]);
        assert!(matches!(Params::load(&fp), Err(RnnError::Checkpoint(_))));
    }

    #[test]
    fn load_rejects_truncated_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fp = dir.path().join("short.bin");
        let mut w = array("W", 3, 3);
        w.data.pop();
        write_raw(&fp, vec![array("U", 3, 5), array("V", 5, 3), w]);
        assert!(matches!(Params::load(&fp), Err(RnnError::ShapeMismatch(_))));
    }
}
