//! Access to input corpora and publication of result artifacts.
//!
//! A [`Storage`] knows how to open a [`Source`] as a byte stream and how to publish a finished
//! local file. [`LocalStorage`] only handles the filesystem. [`GsutilStorage`] adds object store
//! access through the `gsutil` tool, streaming objects instead of downloading them first.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use flate2::read::MultiGzDecoder;
use log::debug;

use crate::errors::*;
use crate::record::Origin;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const READ_BUF_SIZE: usize = 1 << 16;

/// An input corpus location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Object { bucket: String, key: String },
}

impl Source {
    pub fn origin(&self) -> Origin {
        match self {
            Source::Local(path) => Origin::File(path.display().to_string()),
            Source::Object { bucket, key } => Origin::Object {
                bucket: bucket.clone(),
                key: key.clone(),
            },
        }
    }

    fn unavailable(&self, reason: impl fmt::Display) -> Error {
        Error::SourceUnavailable {
            source_name: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(path) => write!(f, "{}", path.display()),
            Source::Object { bucket, key } => write!(f, "gs://{bucket}/{key}"),
        }
    }
}

pub trait Storage {
    /// Open the raw (possibly compressed) byte stream of a source.
    fn fetch(&self, source: &Source) -> Result<Box<dyn Read + Send>>;

    /// Copy a completed local artifact to `destination` under its file name.
    fn publish(&self, local: &Path, destination: &str) -> Result<()>;

    /// Open a source and transparently decompress it if it is gzip-compressed.
    fn open(&self, source: &Source) -> Result<Box<dyn BufRead + Send>> {
        let raw = self.fetch(source)?;
        decompressed(raw).map_err(|e| Error::SourceIo {
            source_name: source.to_string(),
            source: e,
        })
    }
}

/// Wrap a byte stream in a gzip decoder when it starts with the gzip magic bytes.
///
/// Concatenated gzip members (as produced by bgzip) are decoded as one stream.
pub fn decompressed(raw: impl Read + Send + 'static) -> std::io::Result<Box<dyn BufRead + Send>> {
    let mut reader = BufReader::with_capacity(READ_BUF_SIZE, raw);
    let head = reader.fill_buf()?;

    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::with_capacity(
            READ_BUF_SIZE,
            MultiGzDecoder::new(reader),
        )))
    } else {
        Ok(Box::new(reader))
    }
}

fn open_local(source: &Source, path: &Path) -> Result<Box<dyn Read + Send>> {
    if !path.is_file() {
        return Err(source.unavailable("no such file"));
    }
    let file = File::open(path).map_err(|e| source.unavailable(e))?;
    Ok(Box::new(file))
}

fn file_name_of(local: &Path) -> Result<String> {
    local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Upload {
            file: local.to_owned(),
            destination: String::new(),
            reason: "artifact path has no file name".to_owned(),
        })
}

/// Filesystem-only storage. Publishing copies the artifact into a destination directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn fetch(&self, source: &Source) -> Result<Box<dyn Read + Send>> {
        match source {
            Source::Local(path) => open_local(source, path),
            Source::Object { .. } => Err(source.unavailable("no object store is configured")),
        }
    }

    fn publish(&self, local: &Path, destination: &str) -> Result<()> {
        let upload_err = |reason: String| Error::Upload {
            file: local.to_owned(),
            destination: destination.to_owned(),
            reason,
        };

        let dir = Path::new(destination);
        if !dir.is_dir() {
            return Err(upload_err("destination is not a directory".to_owned()));
        }

        let target = dir.join(file_name_of(local)?);
        if target == local {
            return Ok(());
        }
        std::fs::copy(local, &target).map_err(|e| upload_err(e.to_string()))?;
        Ok(())
    }
}

/// Object store access through the `gsutil` command-line tool.
#[derive(Debug, Clone)]
pub struct GsutilStorage {
    program: String,
}

impl Default for GsutilStorage {
    fn default() -> Self {
        Self::new("gsutil")
    }
}

impl GsutilStorage {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the tool can be launched at all.
    pub fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn url(bucket: &str, key: &str) -> String {
        format!("gs://{}/{}", bucket.trim_end_matches('/'), key)
    }
}

impl Storage for GsutilStorage {
    fn fetch(&self, source: &Source) -> Result<Box<dyn Read + Send>> {
        let (bucket, key) = match source {
            Source::Local(path) => return open_local(source, path),
            Source::Object { bucket, key } => (bucket, key),
        };
        let url = Self::url(bucket, key);

        let stat = Command::new(&self.program)
            .args(["-q", "stat", &url])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| source.unavailable(format!("cannot run {}: {e}", self.program)))?;
        if !stat.success() {
            return Err(source.unavailable("object not found or not accessible"));
        }

        debug!("Streaming {url}");
        let mut child = Command::new(&self.program)
            .args(["cat", &url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| source.unavailable(format!("cannot run {}: {e}", self.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| source.unavailable("no output stream"))?;

        Ok(Box::new(ChildReader {
            child,
            stdout,
            done: false,
        }))
    }

    fn publish(&self, local: &Path, destination: &str) -> Result<()> {
        let url = Self::url(destination, &file_name_of(local)?);
        let upload_err = |reason: String| Error::Upload {
            file: local.to_owned(),
            destination: url.clone(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("cp")
            .arg(local)
            .arg(&url)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| upload_err(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(upload_err(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }

        Ok(())
    }
}

/// Stdout of a streaming child process. Reaching end of stream checks the exit status, so a
/// transfer that dies midway surfaces as a read error instead of a silently short corpus.
struct ChildReader {
    child: Child,
    stdout: ChildStdout,
    done: bool,
}

impl Read for ChildReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.done {
            return Ok(0);
        }

        let n = self.stdout.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.done = true;
            let status = self.child.wait()?;
            if !status.success() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("transfer exited with {status}"),
                ));
            }
        }

        Ok(n)
    }
}

impl Drop for ChildReader {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::*;

    fn read_all(mut r: impl BufRead) -> String {
        let mut s = String::new();
        r.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn plain_and_gzip_sources_read_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let text = ">P1 test\nMKLLAF\n";

        let plain = dir.path().join("plain.fasta");
        std::fs::write(&plain, text).unwrap();

        let gz = dir.path().join("packed.fasta.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap();

        let storage = LocalStorage;
        let a = read_all(storage.open(&Source::Local(plain)).unwrap());
        let b = read_all(storage.open(&Source::Local(gz)).unwrap());
        assert_eq!(a, text);
        assert_eq!(b, text);
    }

    #[test]
    fn concatenated_gzip_members_are_one_stream() {
        let mut bytes = Vec::new();
        for part in [">A\nMK\n", ">B\nLL\n"] {
            let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
            enc.write_all(part.as_bytes()).unwrap();
            bytes.extend(enc.finish().unwrap());
        }

        let r = decompressed(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(read_all(r), ">A\nMK\n>B\nLL\n");
    }

    #[test]
    fn missing_sources_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Source::Local(dir.path().join("nope.fa.gz"));
        assert!(matches!(
            LocalStorage.fetch(&missing),
            Err(Error::SourceUnavailable { .. })
        ));

        let remote = Source::Object {
            bucket: "bucket".to_owned(),
            key: "uniref50.fasta.gz".to_owned(),
        };
        assert!(matches!(
            LocalStorage.fetch(&remote),
            Err(Error::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn local_publish_copies_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hits.tsv");
        std::fs::write(&out, "a\tb\n").unwrap();
        let dest = dir.path().join("published");
        std::fs::create_dir(&dest).unwrap();

        LocalStorage
            .publish(&out, dest.to_str().unwrap())
            .unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("hits.tsv")).unwrap(), "a\tb\n");

        let err = LocalStorage
            .publish(&out, dir.path().join("absent").to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Upload { .. }));
    }

    #[test]
    fn missing_tool_is_not_available() {
        let storage = GsutilStorage::new("lrrscan-no-such-tool");
        assert!(!storage.available());

        let remote = Source::Object {
            bucket: "bucket".to_owned(),
            key: "key".to_owned(),
        };
        assert!(matches!(
            storage.fetch(&remote),
            Err(Error::SourceUnavailable { .. })
        ));
    }
}
