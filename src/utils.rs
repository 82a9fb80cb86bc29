use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn open_file<P: AsRef<Path>>(path: P) -> io::Result<File> {
    File::open(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            io::Error::new(e.kind(), format!("File not found: {:?}", path.as_ref()))
        } else {
            e
        }
    })
}

/// Returns true when the file name ends in `.gz`.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().extension().and_then(|s| s.to_str()) == Some("gz")
}

/// Open a text file for line reading, transparently decompressing `.gz` input.
pub fn open_text_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let file = open_file(&path)?;
    let reader: Box<dyn BufRead> = if is_gzipped(&path) {
        Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

pub fn create_dir<P: AsRef<Path>>(dirname: P) -> io::Result<()> {
    let dirname = dirname.as_ref();
    if !dirname.exists() {
        fs::create_dir_all(dirname)?;
    }
    Ok(())
}

/// Write a file through a sibling temp file and rename it into place, so a
/// reader never sees a half written file.
pub fn write_atomically<P, F>(path: P, fill: F) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir(parent)?;
        }
    }
    let tmp_path = tmp_sibling(path);
    let written = File::create(&tmp_path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        fill(&mut writer)?;
        writer.flush()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Splits a comma separated list, dropping empty items.
pub fn parse_comma_separated_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
