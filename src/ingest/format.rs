//! Upload description: format tag, format options and raw bytes.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};

/// Declared format of an upload. Closed set; each tag has exactly one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Tsv,
    Json,
    Jsonl,
    Parquet,
    Avro,
    Orc,
}

impl FileFormat {
    /// Detect the format from a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "tsv" | "tab" => Some(FileFormat::Tsv),
            "json" => Some(FileFormat::Json),
            "jsonl" | "ndjson" => Some(FileFormat::Jsonl),
            "parquet" | "pq" => Some(FileFormat::Parquet),
            "avro" => Some(FileFormat::Avro),
            "orc" => Some(FileFormat::Orc),
            _ => None,
        }
    }

    /// Detect the format of a file from its name.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| {
            QuarryError::unsupported_format(
                if ext.is_empty() { "<none>" } else { ext },
                format!("cannot infer a format from '{}'", path.display()),
            )
        })
    }

    /// Whether the format is line-oriented text whose types must be inferred.
    pub fn is_delimited(&self) -> bool {
        matches!(self, FileFormat::Csv | FileFormat::Tsv)
    }

    /// Whether the file embeds its own schema.
    pub fn is_self_describing(&self) -> bool {
        matches!(self, FileFormat::Parquet | FileFormat::Avro | FileFormat::Orc)
    }

    /// Delimiter used when none is given: comma for CSV, tab for TSV.
    pub fn default_delimiter(&self) -> u8 {
        match self {
            FileFormat::Tsv => b'\t',
            _ => b',',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Tsv => "tsv",
            FileFormat::Json => "json",
            FileFormat::Jsonl => "jsonl",
            FileFormat::Parquet => "parquet",
            FileFormat::Avro => "avro",
            FileFormat::Orc => "orc",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| QuarryError::unsupported_format(s, "unknown format tag"))
    }
}

/// Text encoding of a delimited upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    ShiftJis,
    /// Microsoft's Shift_JIS superset (Windows-31J).
    Cp932,
}

impl TextEncoding {
    /// The decoder backing this encoding.
    ///
    /// encoding_rs decodes `Shift_JIS` with the Windows-31J extensions, so
    /// both Japanese variants share one decoder.
    pub fn encoding(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 => encoding_rs::UTF_8,
            TextEncoding::ShiftJis | TextEncoding::Cp932 => encoding_rs::SHIFT_JIS,
        }
    }
}

impl FromStr for TextEncoding {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "shift-jis" | "sjis" | "shiftjis" => Ok(TextEncoding::ShiftJis),
            "cp932" | "windows-31j" | "ms932" => Ok(TextEncoding::Cp932),
            other => Err(QuarryError::unsupported_format(
                "csv",
                format!("unsupported text encoding '{other}'"),
            )),
        }
    }
}

/// Format-specific options supplied alongside the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Field delimiter for CSV/TSV. `None` means the format's default.
    pub delimiter: Option<u8>,
    pub encoding: TextEncoding,
    /// Whether the first CSV/TSV record names the columns.
    pub has_header: bool,
    /// Rows scanned per column when inferring types.
    pub sample_rows: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: TextEncoding::Utf8,
            has_header: true,
            sample_rows: 1000,
        }
    }
}

impl FormatOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.has_header = false;
        self
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows.max(1);
        self
    }
}

/// Raw bytes of one uploaded file, consumed once by the normalizer.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Original file name, used for the default table name.
    pub name: String,
    pub bytes: Bytes,
    pub format: FileFormat,
    pub options: FormatOptions,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>, format: FileFormat) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            format,
            options: FormatOptions::default(),
        }
    }

    /// Read a file from disk, detecting its format from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let format = FileFormat::detect(path)?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes, format))
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Delimiter in effect for this upload.
    pub fn delimiter(&self) -> u8 {
        self.options
            .delimiter
            .unwrap_or_else(|| self.format.default_delimiter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(FileFormat::detect(Path::new("a/b/users.CSV")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::detect(Path::new("x.tsv")).unwrap(), FileFormat::Tsv);
        assert_eq!(FileFormat::detect(Path::new("x.json")).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::detect(Path::new("x.jsonl")).unwrap(), FileFormat::Jsonl);
        assert_eq!(FileFormat::detect(Path::new("x.parquet")).unwrap(), FileFormat::Parquet);
        assert_eq!(FileFormat::detect(Path::new("x.avro")).unwrap(), FileFormat::Avro);
        assert_eq!(FileFormat::detect(Path::new("x.orc")).unwrap(), FileFormat::Orc);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = FileFormat::detect(Path::new("report.xlsx")).unwrap_err();
        assert!(matches!(err, QuarryError::UnsupportedFormat { ref format, .. } if format == "xlsx"));
        assert!(FileFormat::detect(Path::new("README")).is_err());
    }

    #[test]
    fn parses_tags_and_encodings() {
        assert_eq!("JSONL".parse::<FileFormat>().unwrap(), FileFormat::Jsonl);
        assert_eq!(".parquet".parse::<FileFormat>().unwrap(), FileFormat::Parquet);
        assert_eq!("shift_jis".parse::<TextEncoding>().unwrap(), TextEncoding::ShiftJis);
        assert_eq!("CP932".parse::<TextEncoding>().unwrap(), TextEncoding::Cp932);
        assert!("latin-1".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn delimiter_defaults_per_format() {
        let csv = FileUpload::new("a.csv", "a", FileFormat::Csv);
        let tsv = FileUpload::new("a.tsv", "a", FileFormat::Tsv);
        assert_eq!(csv.delimiter(), b',');
        assert_eq!(tsv.delimiter(), b'\t');
        let piped = csv.with_options(FormatOptions::default().with_delimiter(b'|'));
        assert_eq!(piped.delimiter(), b'|');
    }
}
