use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// File categories understood by the pipeline and the genome browser
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Fq,
    Fa,
    Sam,
    Bam,
    Cram,
    Bed,
    Vcf,
    Txt,
    Json,
    Gff,
    Gtf,
    Wig,
    Unknown,
}

/// suffix -> category, checked in this order
static SUFFIXES: &[(&str, FileType)] = &[
    ("fastq", FileType::Fq),
    ("fq", FileType::Fq),
    ("fa", FileType::Fa),
    ("fasta", FileType::Fa),
    ("sam", FileType::Sam),
    ("bam", FileType::Bam),
    ("cram", FileType::Cram),
    ("bed", FileType::Bed),
    ("bed6", FileType::Bed),
    ("vcf", FileType::Vcf),
    ("txt", FileType::Txt),
    ("tsv", FileType::Txt),
    ("csv", FileType::Txt),
    ("json", FileType::Json),
    ("gff", FileType::Gff),
    ("gff3", FileType::Gff),
    ("gtf", FileType::Gtf),
    ("wig", FileType::Wig),
    ("bigwig", FileType::Wig),
];

impl FileType {
    /// Classify a file name by its dot-suffix chain
    ///
    /// Suffixes are walked left to right after the stem, so `tumor.fastq.gz` is `Fq` and
    /// `calls.vcf.gz` is `Vcf`. The first suffix that names a known category wins; a name with
    /// no known suffix is `Unknown`.
    pub fn infer(name: &str) -> FileType {
        name.split('.')
            .skip(1)
            .find_map(|suffix| {
                let suffix = suffix.to_ascii_lowercase();
                SUFFIXES
                    .iter()
                    .find(|(known, _)| *known == suffix)
                    .map(|(_, file_type)| *file_type)
            })
            .unwrap_or(FileType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Fq => "FQ",
            FileType::Fa => "FA",
            FileType::Sam => "SAM",
            FileType::Bam => "BAM",
            FileType::Cram => "CRAM",
            FileType::Bed => "BED",
            FileType::Vcf => "VCF",
            FileType::Txt => "TXT",
            FileType::Json => "JSON",
            FileType::Gff => "GFF",
            FileType::Gtf => "GTF",
            FileType::Wig => "WIG",
            FileType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            FileType::Fq,
            FileType::Fa,
            FileType::Sam,
            FileType::Bam,
            FileType::Cram,
            FileType::Bed,
            FileType::Vcf,
            FileType::Txt,
            FileType::Json,
            FileType::Gff,
            FileType::Gtf,
            FileType::Wig,
            FileType::Unknown,
        ]
        .into_iter()
        .find(|file_type| file_type.as_str() == s)
        .ok_or_else(|| format!("unknown file type code {s}"))
    }
}
