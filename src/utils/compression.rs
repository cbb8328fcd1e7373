use crossbeam_channel::Sender;
use flate2::read::{GzDecoder, MultiGzDecoder};
use glob::glob;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tar::Archive;

use crate::log;

const READ_BUFFER_SIZE: usize = 1 << 20;

/// Recursively collect `.gz` / `.tgz` / `.tar.gz` trace files under `dir`,
/// sorted for a deterministic processing order.
pub fn list_trace_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*", dir.display());
    let entries =
        glob(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| e.into_error())?;
        if !path.is_file() {
            continue;
        }
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".gz") || name.ends_with(".tgz") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_tar_gz(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Stream non-blank lines from a gzip or tar.gz trace file into `tx`,
/// returning the number of lines sent. A closed channel (all workers gone)
/// stops the stream without an error.
pub fn stream_lines(path: &Path, tx: &Sender<String>) -> io::Result<u64> {
    if is_tar_gz(path) {
        stream_tar_gz(path, tx)
    } else {
        stream_plain_gz(path, tx)
    }
}

fn stream_plain_gz(path: &Path, tx: &Sender<String>) -> io::Result<u64> {
    let file = File::open(path)?;
    // MultiGzDecoder: concatenated gzip members are common in rotated traces
    let reader = BufReader::with_capacity(READ_BUFFER_SIZE, MultiGzDecoder::new(file));
    send_lines(reader, tx)
}

fn stream_tar_gz(path: &Path, tx: &Sender<String>) -> io::Result<u64> {
    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut sent = 0u64;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        if let Ok(name) = entry.path() {
            log!("reading archived file: {} ({} bytes)", name.display(), entry.size());
        }
        sent += send_lines(BufReader::with_capacity(READ_BUFFER_SIZE, &mut entry), tx)?;
    }
    Ok(sent)
}

fn send_lines<R: BufRead>(reader: R, tx: &Sender<String>) -> io::Result<u64> {
    let mut sent = 0u64;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(line).is_err() {
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gz_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tracestat_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_stream_plain_gz_skips_blank_lines() {
        let dir = temp_dir("plain_gz");
        let path = gz_file(&dir, "t.gz", "a,b\n\n   \nc,d\n");

        let (tx, rx) = unbounded();
        let sent = stream_lines(&path, &tx).unwrap();
        drop(tx);

        assert_eq!(sent, 2);
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, vec!["a,b".to_string(), "c,d".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_list_trace_files_filters_and_sorts() {
        let dir = temp_dir("list");
        gz_file(&dir, "b.gz", "x\n");
        gz_file(&dir, "a.gz", "x\n");
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let files = list_trace_files(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.gz".to_string(), "b.gz".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
