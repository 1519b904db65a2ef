//! The quantized network artifact.
//!
//! Layout, all integers little-endian:
//!
//! | field                         | width          |
//! |-------------------------------|----------------|
//! | magic `NNUE`                  | 4 bytes        |
//! | version id                    | u32            |
//! | architecture id               | u32            |
//! | description length `n`        | u32            |
//! | description (UTF-8)           | `n` bytes      |
//! | `feature_in` weights / bias   | i16 / i32      |
//! | `feature_out` weights / bias  | i8 / i32       |
//! | `hidden` weights / bias       | i8 / i32       |
//! | `output` weights / bias       | i8 / i32       |
//!
//! Every weight matrix is output-major: all weights feeding output 0, then
//! output 1, and so on. The version id names that order and the quantization
//! scheme, so a reader knows what to divide each integer by:
//!
//! | version id   | scheme   | feature weight / bias | output weight | output bias |
//! |--------------|----------|-----------------------|---------------|-------------|
//! | `0x7AF32F01` | `plain`  | x1 / x1               | x1            | x1          |
//! | `0x7AF32F16` | `scaled` | x255 / x255           | x64           | x255*64     |

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use scopeguard::ScopeGuard;
use tracing::{debug, info, warn};

use crate::config::{BOTTLENECK, ExportConfig, NetworkConfig, OUTPUT, QuantScheme};
use crate::error::ExportError;
use crate::network::NetworkParameters;
use crate::quantize::{QuantizationReport, SlotRole, write_slot};

/// Leading tag of every artifact.
pub const MAGIC: [u8; 4] = *b"NNUE";

/// Format version for [`QuantScheme::Plain`]: output-major matrices, i16/i32
/// feature transformer, i8/i32 output stage, values rounded without scaling.
pub const VERSION_PLAIN: u32 = 0x7AF3_2F01;

/// Same layout as [`VERSION_PLAIN`], values multiplied by [`QuantScheme::Scaled`]'s scales.
pub const VERSION_SCALED: u32 = 0x7AF3_2F16;

/// Header version id written for `scheme`.
pub const fn version_for(scheme: QuantScheme) -> u32 {
    match scheme {
        QuantScheme::Plain => VERSION_PLAIN,
        QuantScheme::Scaled => VERSION_SCALED,
    }
}

/// Architecture id for `HalfKP -> hidden -> 32 -> 32 -> 1`.
pub const ARCHITECTURE: u32 = 177;

/// Fixed part of the header: magic, version, architecture, description length.
pub const FIXED_HEADER_LEN: usize = 4 + 4 + 4 + 4;

/// Parsed artifact header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub version: u32,
    pub architecture: u32,
    pub description: String,
}

impl BlobHeader {
    pub fn new(description: impl Into<String>, scheme: QuantScheme) -> Self {
        Self {
            version: version_for(scheme),
            architecture: ARCHITECTURE,
            description: description.into(),
        }
    }

    /// The scheme named by the version id, `None` for an id this crate does not write.
    pub fn scheme(&self) -> Option<QuantScheme> {
        QuantScheme::ALL
            .into_iter()
            .find(|&scheme| version_for(scheme) == self.version)
    }

    /// Header length in bytes, including the description.
    pub fn byte_len(&self) -> usize {
        FIXED_HEADER_LEN + self.description.len()
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), ExportError> {
        let len = u32::try_from(self.description.len()).map_err(|_| {
            ExportError::DescriptionTooLong {
                len: self.description.len(),
            }
        })?;
        writer.write_all(&MAGIC)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.architecture.to_le_bytes())?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(self.description.as_bytes())?;
        Ok(())
    }

    /// Read and check the header, leaving `reader` at the first parameter byte.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ExportError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ExportError::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }
        let version = read_u32(reader)?;
        let architecture = read_u32(reader)?;
        let len = read_u32(reader)? as usize;

        let mut description = Vec::new();
        reader.by_ref().take(len as u64).read_to_end(&mut description)?;
        if description.len() != len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        let description = String::from_utf8(description).map_err(|_| ExportError::InvalidDescription)?;

        Ok(Self {
            version,
            architecture,
            description,
        })
    }
}

fn read_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// One parameter section of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub role: SlotRole,
    /// Byte offset from the start of the artifact.
    pub offset: usize,
    pub len: usize,
}

/// Byte layout of an artifact for a given shape, computed without any parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLayout {
    pub header_len: usize,
    pub sections: Vec<Section>,
    pub total_len: usize,
}

impl BlobLayout {
    pub fn for_config(config: &NetworkConfig, description_len: usize) -> Self {
        let (input, hidden) = (config.input_size(), config.hidden_size);
        let [fi, fo, h, o] = NetworkParameters::LAYERS;
        let shapes = [
            (fi, SlotRole::FeatureWeight, input * hidden),
            (fi, SlotRole::FeatureBias, hidden),
            (fo, SlotRole::OutputWeight, hidden * BOTTLENECK),
            (fo, SlotRole::OutputBias, BOTTLENECK),
            (h, SlotRole::OutputWeight, BOTTLENECK * BOTTLENECK),
            (h, SlotRole::OutputBias, BOTTLENECK),
            (o, SlotRole::OutputWeight, BOTTLENECK * OUTPUT),
            (o, SlotRole::OutputBias, OUTPUT),
        ];

        let header_len = FIXED_HEADER_LEN + description_len;
        let mut offset = header_len;
        let sections = shapes
            .into_iter()
            .map(|(layer, role, count)| {
                let tensor = if role.is_bias() { "bias" } else { "weights" };
                let section = Section {
                    name: format!("{layer}.{tensor}"),
                    role,
                    offset,
                    len: count * role.width(),
                };
                offset += section.len;
                section
            })
            .collect();

        Self {
            header_len,
            sections,
            total_len: offset,
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// Quantize `params` and write a complete artifact to `writer` in one pass.
///
/// Clipped values are counted in the returned report; a slot whose clipped
/// fraction exceeds `config.clip_warn_ratio` is logged at `warn`.
pub fn export_to_writer<W: Write>(
    params: &NetworkParameters,
    description: &str,
    config: &ExportConfig,
    mut writer: W,
) -> Result<QuantizationReport, ExportError> {
    BlobHeader::new(description, config.scheme).write(&mut writer)?;

    let scales = config.scheme.scales();
    let mut report = QuantizationReport::default();
    for slot in params.slots() {
        let slot_report = write_slot(&slot, &scales, &mut writer)?;
        let fraction = slot_report.clipped_fraction();
        if fraction > config.clip_warn_ratio {
            warn!(
                slot = %slot_report.name,
                clipped = slot_report.clipped,
                total = slot_report.total,
                fraction,
                "many values clipped during quantization"
            );
        } else if slot_report.clipped > 0 {
            debug!(slot = %slot_report.name, clipped = slot_report.clipped, "values clipped");
        }
        report.push(slot_report);
    }

    writer.flush()?;
    Ok(report)
}

/// `<dest>.tmp` next to `dest`.
fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    dest.with_file_name(name)
}

/// Export to `dest` atomically: write a sibling temporary file, sync it, then
/// rename it over `dest`. On any failure the temporary file is removed and
/// `dest` is left as it was.
pub fn export_to_path(
    params: &NetworkParameters,
    description: &str,
    config: &ExportConfig,
    dest: &Path,
) -> Result<QuantizationReport, ExportError> {
    if u32::try_from(description.len()).is_err() {
        return Err(ExportError::DescriptionTooLong {
            len: description.len(),
        });
    }

    let tmp = temp_path(dest);
    let file = File::create(&tmp)?;
    let guard = scopeguard::guard(tmp, |tmp| {
        if let Err(err) = fs::remove_file(&tmp) {
            debug!(path = %tmp.display(), %err, "could not remove temporary export file");
        }
    });

    let mut writer = BufWriter::new(file);
    let report = export_to_writer(params, description, config, &mut writer)?;
    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&*guard, dest)?;
    // renamed into place: nothing left to clean up
    ScopeGuard::into_inner(guard);

    let bytes = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    info!(
        path = %dest.display(),
        bytes,
        scheme = %config.scheme,
        clipped = report.total_clipped(),
        "exported quantized network"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{
        ARCHITECTURE, BlobHeader, BlobLayout, MAGIC, VERSION_PLAIN, VERSION_SCALED, export_to_writer,
        temp_path,
    };
    use crate::config::{ExportConfig, NetworkConfig, QuantScheme};
    use crate::error::ExportError;
    use crate::network::NetworkParameters;

    fn small() -> NetworkConfig {
        NetworkConfig {
            hidden_size: 4,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn header_bytes_are_little_endian() {
        let mut out: Vec<u8> = Vec::new();
        BlobHeader::new("ab", QuantScheme::Scaled).write(&mut out).unwrap();
        assert_eq!(&out[..4], &MAGIC);
        assert_eq!(&out[4..8], &[0x16, 0x2f, 0xf3, 0x7a]);
        assert_eq!(&out[8..12], &[177, 0, 0, 0]);
        assert_eq!(&out[12..16], &[2, 0, 0, 0]);
        assert_eq!(&out[16..], b"ab");
    }

    #[test]
    fn header_read_rejects_bad_magic() {
        let mut bytes: Vec<u8> = Vec::new();
        BlobHeader::new("x", QuantScheme::Scaled).write(&mut bytes).unwrap();
        bytes[0] = b'X';
        let err = BlobHeader::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ExportError::BadMagic { found, .. } if &found == b"XNUE"));
    }

    #[test]
    fn header_read_rejects_truncated_description() {
        let mut bytes: Vec<u8> = Vec::new();
        BlobHeader::new("hello", QuantScheme::Plain).write(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            BlobHeader::read(&mut Cursor::new(bytes)),
            Err(ExportError::Io { .. })
        ));
    }

    #[test]
    fn export_matches_layout() {
        let config = small();
        let params = NetworkParameters::from_fn(&config, || 0.01);
        let mut out: Vec<u8> = Vec::new();
        let export = ExportConfig {
            scheme: QuantScheme::Plain,
            ..ExportConfig::default()
        };
        let report = export_to_writer(&params, "tiny", &export, &mut out).unwrap();
        assert_eq!(report.total_clipped(), 0);

        let layout = BlobLayout::for_config(&config, 4);
        assert_eq!(out.len(), layout.total_len);
        assert_eq!(layout.sections.len(), 8);
        let header = BlobHeader::read(&mut Cursor::new(&out)).unwrap();
        assert_eq!(header.version, VERSION_PLAIN);
        assert_eq!(header.scheme(), Some(QuantScheme::Plain));
        assert_eq!(header.architecture, ARCHITECTURE);
        assert_eq!(header.description, "tiny");
        assert_eq!(header.byte_len(), layout.header_len);
    }

    #[test]
    fn schemes_write_distinct_headers() {
        let params = NetworkParameters::from_fn(&small(), || 0.1);
        let mut headers = Vec::new();
        for scheme in QuantScheme::ALL {
            let export = ExportConfig {
                scheme,
                ..ExportConfig::default()
            };
            let mut out: Vec<u8> = Vec::new();
            export_to_writer(&params, "same", &export, &mut out).unwrap();
            let header = BlobHeader::read(&mut Cursor::new(&out)).unwrap();
            assert_eq!(header.scheme(), Some(scheme));
            headers.push(header);
        }
        assert_ne!(headers[0], headers[1]);
        assert_eq!(headers[1].version, VERSION_SCALED);
    }

    #[test]
    fn unknown_version_has_no_scheme() {
        let header = BlobHeader {
            version: 7,
            ..BlobHeader::new("x", QuantScheme::Plain)
        };
        assert_eq!(header.scheme(), None);
    }

    #[test]
    fn sections_are_contiguous() {
        let layout = BlobLayout::for_config(&NetworkConfig::default(), 10);
        let mut expected = layout.header_len;
        for section in &layout.sections {
            assert_eq!(section.offset, expected, "{}", section.name);
            expected += section.len;
        }
        assert_eq!(expected, layout.total_len);
        assert_eq!(layout.section("output.bias").map(|s| s.len), Some(4));
        assert_eq!(layout.section("hidden.weights").map(|s| s.len), Some(32 * 32));
    }

    #[test]
    fn temp_path_is_sibling() {
        let tmp = temp_path(std::path::Path::new("/a/b/net.nnue"));
        assert_eq!(tmp, std::path::Path::new("/a/b/net.nnue.tmp"));
    }
}
