//! Interactive prompts: workbook picker and geometry values.
//!
//! This is intentionally kept separate from clap parsing:
//! - clap handles structured flags/subcommands
//! - the picker provides the "run `fetx analyze` and choose a workbook" UX
//!
//! The picker searches for workbooks (spreadsheet files, and directories
//! holding `Run*.csv` sheets) under the current working directory.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::io::ingest::{has_csv_extension, is_spreadsheet};

/// Default directory recursion depth for finding workbooks.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Prompt the user to select a workbook from the current directory tree.
///
/// Behavior:
/// - list discovered workbooks
/// - accept either a number (from the list) or an explicit path
/// - `q` (or end of input) returns `Ok(None)`
pub fn prompt_for_workbook(prefix: &str) -> Result<Option<PathBuf>, AppError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let files = discover_workbooks(Path::new("."), prefix);

    if files.is_empty() {
        println!("No workbooks found below the current directory.");
    } else {
        println!("Found {} workbook(s):", files.len());
        for (idx, path) in files.iter().enumerate() {
            println!("{:>3}) {}", idx + 1, pretty_path(path));
        }
    }

    loop {
        let prompt = if files.is_empty() {
            "Type a workbook path (q to quit): ".to_string()
        } else {
            format!("Select a workbook by number (1-{}) or type a path (q to quit): ", files.len())
        };
        let Some(line) = read_answer(&mut input, &prompt)? else {
            return Ok(None);
        };
        if line.eq_ignore_ascii_case("q") || line == "0" {
            return Ok(None);
        }

        if let Ok(choice) = line.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return Ok(Some(files[choice - 1].clone()));
            }
            println!("Invalid choice: {choice}. Enter a number between 1 and {}.", files.len());
            continue;
        }

        match validate_workbook_path(Path::new(&line)) {
            Ok(path) => return Ok(Some(path)),
            Err(err) => println!("{err}"),
        }
    }
}

/// Prompt until the user enters a finite number > 0.
pub fn prompt_positive(label: &str) -> Result<f64, AppError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    prompt_positive_from(&mut input, label)
}

/// [`prompt_positive`] over any line source.
pub fn prompt_positive_from<R: BufRead>(input: &mut R, label: &str) -> Result<f64, AppError> {
    loop {
        let Some(line) = read_answer(input, &format!("Please input {label}: "))? else {
            return Err(AppError::new(2, format!("No value received for {label}.")));
        };
        match parse_positive(&line) {
            Ok(v) => return Ok(v),
            Err(msg) => println!("{msg}"),
        }
    }
}

pub fn parse_positive(raw: &str) -> Result<f64, String> {
    let v = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Not a number: '{}'.", raw.trim()))?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(format!("Value must be finite and > 0 (got {v})."))
    }
}

/// Check that `path` exists and is a spreadsheet, a CSV file or a directory.
pub fn validate_workbook_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(2, format!("Workbook not found: {}", path.display())));
    }
    if path.is_file() && !(has_csv_extension(path) || is_spreadsheet(path)) {
        return Err(AppError::new(
            2,
            format!(
                "Expected a spreadsheet, a .csv file or a directory of them (got: {}).",
                path.display()
            ),
        ));
    }
    Ok(path.to_path_buf())
}

/// Discover workbooks under `root` (deterministic order).
///
/// Spreadsheet files are listed as they are; a directory holding at least
/// one `<prefix>*.csv` sheet is listed once.
pub fn discover_workbooks(root: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_workbooks_inner(root, 0, DEFAULT_SEARCH_DEPTH, prefix, &mut out);
    out.sort_by(|a, b| pretty_path(a).cmp(&pretty_path(b)));
    out
}

fn find_workbooks_inner(root: &Path, depth: usize, max_depth: usize, prefix: &str, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    let mut has_sheet = false;
    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if should_skip_dir(&path) {
                continue;
            }
            find_workbooks_inner(&path, depth + 1, max_depth, prefix, out);
            continue;
        }

        if !file_type.is_file() {
            continue;
        }
        if is_spreadsheet(&path) {
            out.push(path);
        } else if has_csv_extension(&path) && is_run_sheet(&path, prefix) {
            has_sheet = true;
        }
    }

    if has_sheet {
        out.push(root.to_path_buf());
    }
}

fn read_answer<R: BufRead>(input: &mut R, prompt: &str) -> Result<Option<String>, AppError> {
    print!("{prompt}");
    io::stdout()
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

    let mut line = String::new();
    let bytes = input
        .read_line(&mut line)
        .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn is_run_sheet(path: &Path, prefix: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with(prefix))
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_directories_with_run_sheets() {
        let root = tempfile::tempdir().unwrap();
        let wb = root.path().join("device-a");
        fs::create_dir(&wb).unwrap();
        fs::write(wb.join("Run1.csv"), "a\n").unwrap();
        fs::write(wb.join("Run2.csv"), "a\n").unwrap();

        let other = root.path().join("notes");
        fs::create_dir(&other).unwrap();
        fs::write(other.join("summary.csv"), "a\n").unwrap();

        let skipped = root.path().join("target");
        fs::create_dir(&skipped).unwrap();
        fs::write(skipped.join("Run1.csv"), "a\n").unwrap();

        let book = root.path().join("lab.xls");
        fs::write(&book, "x").unwrap();

        assert_eq!(discover_workbooks(root.path(), "Run"), vec![wb, book]);
    }

    #[test]
    fn prompt_retries_until_positive() {
        let mut input = io::Cursor::new("abc\n-2\n0.5\n");
        assert_eq!(prompt_positive_from(&mut input, "length").unwrap(), 0.5);
    }

    #[test]
    fn prompt_fails_on_end_of_input() {
        let mut input = io::Cursor::new("");
        assert!(prompt_positive_from(&mut input, "width").is_err());
    }

    #[test]
    fn workbook_path_must_be_csv_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "x").unwrap();
        assert!(validate_workbook_path(&txt).is_err());
        let xlsx = dir.path().join("lab.xlsx");
        fs::write(&xlsx, "x").unwrap();
        assert!(validate_workbook_path(&xlsx).is_ok());
        assert!(validate_workbook_path(dir.path()).is_ok());
        assert!(validate_workbook_path(&dir.path().join("missing")).is_err());
    }
}
