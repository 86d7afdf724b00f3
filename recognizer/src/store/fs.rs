//! Directory-backed reference store.
//!
//! Layout: `<root>/<sign>/sequence_<unix-ms>.sexp`, one recorded example per
//! file. Each file is a plist:
//!
//! ```text
//! (:sign "HELLO" :saved-at 1718000000000 :frames 40
//!  :left ((x0 y0 z0 ... x20 y20 z20) ...)
//!  :right ((...) ...))
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::{check_name, RecordedSequence, Records, ReferenceStore, StoreError};
use crate::hand::landmarks::FLAT_LEN;
use crate::sexp;

const FILE_PREFIX: &str = "sequence_";
const FILE_EXT: &str = "sexp";

pub struct FsReferenceStore {
    root: PathBuf,
}

impl FsReferenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Sign names with a directory under the root, sorted.
    pub fn available_signs(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn load_sign(&self, name: &str) -> Result<Vec<RecordedSequence>, StoreError> {
        let dir = self.root.join(name);
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| is_sequence_file(p))
            .collect();
        files.sort();

        let mut examples = Vec::with_capacity(files.len());
        for path in files {
            match read_sequence(&path) {
                Ok(seq) => examples.push(seq),
                Err(e) => warn!("skipping reference: {}", e),
            }
        }
        Ok(examples)
    }

    /// First unused file name for this timestamp.
    fn next_path(dir: &Path, millis: u128) -> (String, PathBuf) {
        let mut id = format!("{}{}.{}", FILE_PREFIX, millis, FILE_EXT);
        let mut n = 1;
        while dir.join(&id).exists() {
            id = format!("{}{}_{}.{}", FILE_PREFIX, millis, n, FILE_EXT);
            n += 1;
        }
        let path = dir.join(&id);
        (id, path)
    }
}

impl ReferenceStore for FsReferenceStore {
    fn load_all(&self) -> Result<Records, StoreError> {
        let mut records = Records::new();
        for name in self.available_signs()? {
            let examples = self.load_sign(&name)?;
            if examples.is_empty() {
                debug!(sign = %name, "sign directory has no usable sequences");
                continue;
            }
            records.insert(name, examples);
        }
        Ok(records)
    }

    fn save(&mut self, name: &str, sequence: &RecordedSequence) -> Result<String, StoreError> {
        check_name(name)?;
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let (id, path) = Self::next_path(&dir, millis);

        // Write then rename so a concurrent load never sees half a file.
        let tmp = dir.join(format!(".{}.tmp", id));
        fs::write(&tmp, render_sequence(name, millis, sequence))?;
        fs::rename(&tmp, &path)?;

        info!(sign = %name, id = %id, frames = sequence.frame_count(), "saved reference sequence");
        Ok(id)
    }
}

fn is_sequence_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX));
    name_ok && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXT)
}

fn render_frames(frames: &[Vec<f32>]) -> String {
    let rows: Vec<String> = frames.iter().map(|f| sexp::number_list(f)).collect();
    format!("({})", rows.join("\n  "))
}

fn render_sequence(name: &str, millis: u128, seq: &RecordedSequence) -> String {
    format!(
        "(:sign {} :saved-at {} :frames {}\n :left {}\n :right {})\n",
        sexp::quoted(name),
        millis,
        seq.frame_count(),
        render_frames(&seq.left),
        render_frames(&seq.right),
    )
}

fn read_sequence(path: &Path) -> Result<RecordedSequence, StoreError> {
    let malformed = |reason: String| StoreError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let text = fs::read_to_string(path)?;
    let value = lexpr::from_str(&text).map_err(|e| malformed(e.to_string()))?;

    let side = |key: &str| -> Result<Vec<Vec<f32>>, StoreError> {
        let Some(list) = sexp::get_value(&value, key) else {
            return Ok(Vec::new());
        };
        sexp::list_items(list)
            .into_iter()
            .enumerate()
            .map(|(i, row)| match sexp::numbers(row) {
                Some(v) if v.len() == FLAT_LEN => Ok(v),
                Some(v) => Err(malformed(format!(
                    ":{} frame {} has {} values, expected {}",
                    key,
                    i,
                    v.len(),
                    FLAT_LEN
                ))),
                None => Err(malformed(format!(":{} frame {} is not numeric", key, i))),
            })
            .collect()
    };

    let seq = RecordedSequence {
        left: side("left")?,
        right: side("right")?,
    };
    if seq.is_empty() {
        return Err(malformed("no frames".to_string()));
    }
    Ok(seq)
}
