use anyhow::{Result, Context};
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

// @const: Extensions accepted as subtitle input
pub const SUBTITLE_EXTENSIONS: [&str; 4] = ["srt", "tsv", "txt", "csv"];

// @const: Name part marking the resume file of an unfinished run
pub const PARTIAL_MARKER: &str = "partial";

// @const: Suffix of the per-input issues log
pub const ISSUES_LOG_SUFFIX: &str = "issues.log";

const UTF8_BOM: &str = "\u{feff}";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    // @checks: Extension is one of the subtitle inputs
    pub fn is_subtitle_input<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                SUBTITLE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }

    // @returns: File-name-safe form of a language name ("Brazilian Portuguese" -> "brazilian-portuguese")
    pub fn language_tag(target_language: &str) -> String {
        target_language
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }

    // @generates: Output path for translated subtitle
    // @params: input_file, output_dir, language tag, extension
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        language_tag: &str,
        extension: &str,
    ) -> PathBuf {
        let input_file = input_file.as_ref();
        let output_dir = output_dir.as_ref();

        let stem = input_file.file_stem().unwrap_or_default();

        let mut output_filename = stem.to_string_lossy().to_string();
        output_filename.push('.');
        output_filename.push_str(language_tag);
        output_filename.push('.');
        output_filename.push_str(extension);

        output_dir.join(output_filename)
    }

    // @generates: Resume file of an unfinished run ("movie.french.partial.tsv")
    pub fn generate_partial_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        language_tag: &str,
    ) -> PathBuf {
        let tag = format!("{}.{}", language_tag, PARTIAL_MARKER);
        Self::generate_output_path(input_file, output_dir, &tag, "tsv")
    }

    // @generates: Issues log of one input ("movie.issues.log")
    pub fn generate_issues_log_path<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, output_dir: P2) -> PathBuf {
        let stem = input_file.as_ref().file_stem().unwrap_or_default().to_string_lossy();
        output_dir.as_ref().join(format!("{}.{}", stem, ISSUES_LOG_SUFFIX))
    }

    // @checks: File was written by a previous run for this language
    pub fn is_generated_output<P: AsRef<Path>>(path: P, language_tag: &str) -> bool {
        path.as_ref()
            .file_stem()
            .map(|stem| {
                let stem = stem.to_string_lossy();
                stem.ends_with(&format!(".{}", language_tag))
                    || stem.ends_with(&format!(".{}.{}", language_tag, PARTIAL_MARKER))
            })
            .unwrap_or(false)
    }

    /// Find subtitle inputs under a directory, sorted by path
    pub fn find_subtitle_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && Self::is_subtitle_input(path) {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a UTF-8 text file, dropping a leading byte order mark
    pub fn read_subtitle_text<P: AsRef<Path>>(path: P) -> Result<String> {
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("File is not valid UTF-8: {:?}", path.as_ref()))?;

        Ok(match text.strip_prefix(UTF8_BOM) {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    pub fn remove_file<P: AsRef<Path>>(path: P) -> Result<()> {
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove file: {:?}", path.as_ref()))
    }

    /// Write a one-sheet workbook: a bold header row, then the rows as text cells
    pub fn write_xlsx<P: AsRef<Path>>(path: P, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent)?;
        }

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Subtitles")?;

        for (col, title) in header.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        }
        for (row, cells) in rows.iter().enumerate() {
            for (col, value) in cells.iter().enumerate() {
                worksheet.write_string(row as u32 + 1, col as u16, value.as_str())?;
            }
        }

        workbook.save(path)
            .with_context(|| format!("Failed to write workbook: {:?}", path))?;
        Ok(())
    }
}
