//! Checkpoint save/load for training state.
//!
//! A checkpoint holds everything [`Trainer`] needs to continue as if it had
//! never stopped: hyperparameters, vocabulary, parameters, Adagrad
//! accumulators, hidden state, cursor, iteration counter, losses and the raw
//! corpus. Partial checkpoints are never written.
//!
//! ## File layout
//!
//! ```text
//! [8 bytes magic "CHARRNN\0"][u32 LE format version][bincode CheckpointData]
//! ```
//!
//! Writes go to a sibling `.partial` file which is synced and then renamed
//! over the target, so an interrupted save leaves the previous checkpoint
//! intact.

use bincode::Options;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::{Params, RnnError, RnnResult};
use crate::data::Vocabulary;
use crate::training::Trainer;
use crate::Config;

/// Leading bytes of every checkpoint file.
pub const MAGIC: &[u8; 8] = b"CHARRNN\0";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = MAGIC.len() + 4;

/// Row-major matrix for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixData {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl From<&Array2<f64>> for MatrixData {
    fn from(arr: &Array2<f64>) -> Self {
        let (rows, cols) = arr.dim();
        Self {
            rows,
            cols,
            data: arr.iter().copied().collect(),
        }
    }
}

impl From<&Array1<f64>> for MatrixData {
    fn from(arr: &Array1<f64>) -> Self {
        Self {
            rows: arr.len(),
            cols: 1,
            data: arr.to_vec(),
        }
    }
}

impl MatrixData {
    fn into_array2(self, name: &str) -> RnnResult<Array2<f64>> {
        Array2::from_shape_vec((self.rows, self.cols), self.data)
            .map_err(|e| RnnError::Checkpoint(format!("Failed to reconstruct {name}: {e}")))
    }

    fn into_array1(self, name: &str) -> RnnResult<Array1<f64>> {
        if self.cols != 1 || self.data.len() != self.rows {
            return Err(RnnError::Checkpoint(format!(
                "{name} should be a column vector, found {}x{} with {} values",
                self.rows,
                self.cols,
                self.data.len()
            )));
        }
        Ok(Array1::from(self.data))
    }
}

/// The five parameter-shaped tensors in serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsData {
    pub wxh: MatrixData,
    pub whh: MatrixData,
    pub why: MatrixData,
    pub bh: MatrixData,
    pub by: MatrixData,
}

impl From<&Params> for ParamsData {
    fn from(p: &Params) -> Self {
        Self {
            wxh: (&p.wxh).into(),
            whh: (&p.whh).into(),
            why: (&p.why).into(),
            bh: (&p.bh).into(),
            by: (&p.by).into(),
        }
    }
}

impl TryFrom<ParamsData> for Params {
    type Error = RnnError;

    fn try_from(d: ParamsData) -> RnnResult<Self> {
        Ok(Self {
            wxh: d.wxh.into_array2("wxh")?,
            whh: d.whh.into_array2("whh")?,
            why: d.why.into_array2("why")?,
            bh: d.bh.into_array1("bh")?,
            by: d.by.into_array1("by")?,
        })
    }
}

/// Serializable checkpoint data: the single schema shared by save and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointData {
    /// Hyperparameters the run was started with.
    pub config: Config,
    /// Vocabulary characters in index order.
    pub vocab: Vec<char>,
    /// Learnable parameters.
    pub params: ParamsData,
    /// Adagrad squared-gradient accumulators.
    pub memory: ParamsData,
    /// Hidden state carried into the next window.
    pub hprev: Vec<f64>,
    /// Start of the next window.
    pub cursor: usize,
    /// Completed iterations.
    pub iteration: usize,
    /// Loss of the last window.
    pub loss: f64,
    /// Smoothed loss.
    pub smooth_loss: f64,
    /// Raw training corpus.
    pub corpus: String,
}

impl From<&Trainer> for CheckpointData {
    fn from(t: &Trainer) -> Self {
        Self {
            config: t.config.clone(),
            vocab: t.vocab.chars.clone(),
            params: (&t.params).into(),
            memory: (&t.optimizer.memory).into(),
            hprev: t.hprev.to_vec(),
            cursor: t.cursor,
            iteration: t.iteration,
            loss: t.loss,
            smooth_loss: t.smooth_loss,
            corpus: t.corpus.clone(),
        }
    }
}

impl TryFrom<CheckpointData> for Trainer {
    type Error = RnnError;

    fn try_from(d: CheckpointData) -> RnnResult<Self> {
        let CheckpointData {
            config,
            vocab,
            params,
            memory,
            hprev,
            cursor,
            iteration,
            loss,
            smooth_loss,
            corpus,
        } = d;

        let vocab = Vocabulary::from_chars(vocab)?;

        Trainer::from_parts(
            config,
            vocab,
            params.try_into()?,
            memory.try_into()?,
            corpus,
            iteration,
            loss,
            smooth_loss,
            Array1::from(hprev),
            cursor,
        )
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Encode training state into checkpoint bytes (header + payload).
///
/// # Errors
///
/// Returns `Checkpoint` if serialization fails.
pub fn encode(trainer: &Trainer) -> RnnResult<Vec<u8>> {
    let data = CheckpointData::from(trainer);
    let payload = codec()
        .serialize(&data)
        .map_err(|e| RnnError::Checkpoint(format!("Failed to serialize checkpoint: {e}")))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode checkpoint bytes back into training state.
///
/// # Errors
/// - `Checkpoint` for a missing magic number, truncated or undecodable
///   payload, or state that fails consistency checks
/// - `VersionMismatch` for a file written by another format version
pub fn decode(bytes: &[u8]) -> RnnResult<Trainer> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(RnnError::Checkpoint("not a char-rnn checkpoint".to_string()));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(RnnError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let data: CheckpointData = codec()
        .deserialize(&bytes[HEADER_LEN..])
        .map_err(|e| RnnError::Checkpoint(format!("Failed to parse checkpoint: {e}")))?;

    Trainer::try_from(data).map_err(|e| match e {
        RnnError::Checkpoint(_) => e,
        other => RnnError::Checkpoint(other.to_string()),
    })
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Flush the directory entry of `path` so a completed rename survives a
/// power loss. Directories cannot be opened for syncing outside Unix.
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Save training state to `path`, atomically replacing any previous file.
///
/// # Errors
///
/// Returns `Io` if the directory cannot be created or the file cannot be
/// written, synced or renamed into place.
pub fn save_checkpoint(trainer: &Trainer, path: &Path) -> RnnResult<()> {
    let bytes = encode(trainer)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| RnnError::Io(format!("Failed to create checkpoint directory: {e}")))?;
    }

    let tmp = partial_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        RnnError::Io(format!("Failed to write checkpoint to {}: {e}", path.display()))
    })?;

    sync_parent_dir(path).map_err(|e| {
        RnnError::Io(format!(
            "Failed to sync checkpoint directory for {}: {e}",
            path.display()
        ))
    })
}

/// Load training state from `path`.
///
/// # Errors
/// - `Io` if the file cannot be read (including when it does not exist)
/// - `Checkpoint` / `VersionMismatch` as for [`decode`]
pub fn load_checkpoint(path: &Path) -> RnnResult<Trainer> {
    let bytes = fs::read(path).map_err(|e| {
        RnnError::Io(format!("Failed to read checkpoint from {}: {e}", path.display()))
    })?;
    decode(&bytes)
}

/// Load training state from `path` if the file exists.
///
/// A missing file means there is no prior run and yields `Ok(None)`; a file
/// that exists but cannot be decoded is an error, never a silent fresh start.
///
/// # Errors
/// As for [`load_checkpoint`], except for a missing file.
pub fn try_load_checkpoint(path: &Path) -> RnnResult<Option<Trainer>> {
    match fs::read(path) {
        Ok(bytes) => decode(&bytes).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RnnError::Io(format!(
            "Failed to read checkpoint from {}: {e}",
            path.display()
        ))),
    }
}
