use crate::record::Field;
use crate::source::ReplaySource;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VectorParseError {
    #[error("Line {line}: expected '<name>: 0x<hex>', found {content:?}")]
    MalformedLine { line: usize, content: String },
    #[error("Line {line}: invalid hex value: {reason}")]
    InvalidHex { line: usize, reason: String },
}

/// A persisted vector read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vector {
    pub fields: Vec<Field>,
}

impl Vector {
    pub fn parse(text: &str) -> Result<Self, VectorParseError> {
        let mut fields = Vec::new();
        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = || VectorParseError::MalformedLine {
                line: idx + 1,
                content: raw_line.to_string(),
            };
            // Field names may themselves contain ':', the value never does.
            let (name, value) = line.rsplit_once(':').ok_or_else(malformed)?;
            let digits = value.trim().strip_prefix("0x").ok_or_else(malformed)?;
            let mut bytes = hex::decode(digits).map_err(|e| VectorParseError::InvalidHex {
                line: idx + 1,
                reason: e.to_string(),
            })?;
            bytes.reverse();
            fields.push(Field::new(name.trim_end(), bytes));
        }
        Ok(Self { fields })
    }

    pub fn byte_count(&self) -> usize {
        self.fields.iter().map(|f| f.bytes.len()).sum()
    }

    /// A byte source that hands the recorded bytes back in draw order.
    pub fn replay_source(&self) -> ReplaySource {
        ReplaySource::new(
            self.fields
                .iter()
                .flat_map(|f| f.bytes.iter().copied())
                .collect::<Vec<u8>>(),
        )
    }
}
