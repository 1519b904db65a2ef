//! Unquantized parameter snapshots handed over by the trainer.
//!
//! `NNUE`, u32 version 1, u32 input size, u32 hidden size, u32 output size,
//! then every tensor as little-endian f32 in slot order.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::config::{BOTTLENECK, FeatureLayout, NetworkConfig, OUTPUT};
use crate::error::CheckpointError;
use crate::export::MAGIC;
use crate::network::{Linear, NetworkParameters};

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Largest hidden size a snapshot may declare.
pub const MAX_HIDDEN: u32 = 1 << 16;

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read `len` floats. Memory grows with the bytes actually present, so a
/// header that overstates the size fails with `UnexpectedEof`.
fn read_tensor<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<f32>> {
    let byte_len = len
        .checked_mul(4)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "tensor size overflows"))?;
    let mut bytes = Vec::new();
    reader.by_ref().take(byte_len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != byte_len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_layer<R: Read>(
    reader: &mut R,
    name: &str,
    inputs: usize,
    outputs: usize,
) -> Result<Linear, CheckpointError> {
    let len = inputs
        .checked_mul(outputs)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "tensor size overflows"))?;
    let weights = read_tensor(reader, len)?;
    let bias = read_tensor(reader, outputs)?;
    Ok(Linear::new(name, inputs, outputs, weights, bias)?)
}

/// Write `params` as a float snapshot.
pub fn write_snapshot<W: Write>(params: &NetworkParameters, mut writer: W) -> Result<(), CheckpointError> {
    let dim = |n: usize| {
        u32::try_from(n).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))
    };
    writer.write_all(&MAGIC)?;
    writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
    writer.write_all(&dim(params.input_size())?.to_le_bytes())?;
    writer.write_all(&dim(params.hidden_size())?.to_le_bytes())?;
    writer.write_all(&dim(OUTPUT)?.to_le_bytes())?;
    for slot in params.slots() {
        for value in slot.values {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read a float snapshot. The feature layout is recovered from the input size;
/// `eval_scale` is not stored and is taken from `base`. The header is checked
/// in full before any tensor is read.
pub fn read_snapshot<R: Read>(
    mut reader: R,
    base: &NetworkConfig,
) -> Result<(NetworkConfig, NetworkParameters), CheckpointError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(CheckpointError::BadMagic { found: magic });
    }
    let version = read_u32(&mut reader)?;
    if version != SNAPSHOT_VERSION {
        return Err(CheckpointError::UnsupportedVersion {
            expected: SNAPSHOT_VERSION,
            found: version,
        });
    }

    let input = read_u32(&mut reader)?;
    let hidden = read_u32(&mut reader)?;
    let output = read_u32(&mut reader)?;
    if output as usize != OUTPUT {
        return Err(CheckpointError::OutputSize {
            expected: OUTPUT as u32,
            found: output,
        });
    }
    let layout = [FeatureLayout::Compact, FeatureLayout::KingRelative]
        .into_iter()
        .find(|layout| layout.input_size() == input as usize)
        .ok_or(CheckpointError::UnknownInputSize { found: input })?;
    if hidden == 0 || hidden > MAX_HIDDEN {
        return Err(CheckpointError::HiddenSize {
            found: hidden,
            max: MAX_HIDDEN,
        });
    }

    let hidden = hidden as usize;
    let config = NetworkConfig {
        layout,
        hidden_size: hidden,
        ..*base
    };
    let input = input as usize;
    let feature_in = read_layer(&mut reader, "feature_in", input, hidden)?;
    let feature_out = read_layer(&mut reader, "feature_out", hidden, BOTTLENECK)?;
    let hidden_layer = read_layer(&mut reader, "hidden", BOTTLENECK, BOTTLENECK)?;
    let output = read_layer(&mut reader, "output", BOTTLENECK, OUTPUT)?;
    let params = NetworkParameters::new(&config, feature_in, feature_out, hidden_layer, output)?;
    Ok((config, params))
}

pub fn save(params: &NetworkParameters, path: &Path) -> Result<(), CheckpointError> {
    write_snapshot(params, BufWriter::new(File::create(path)?))?;
    info!(path = %path.display(), "wrote float snapshot");
    Ok(())
}

pub fn load(path: &Path, base: &NetworkConfig) -> Result<(NetworkConfig, NetworkParameters), CheckpointError> {
    let (config, params) = read_snapshot(BufReader::new(File::open(path)?), base)?;
    info!(
        path = %path.display(),
        layout = %config.layout,
        hidden = config.hidden_size,
        "loaded float snapshot"
    );
    Ok((config, params))
}
