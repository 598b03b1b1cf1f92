//! Target discovery and preparation
//!
//! A target path can be a directory, a regular file, or a block device, and
//! each needs different preparation before the first request:
//!
//! - directory: create an unlinked temporary file inside it and fill the
//!   working window with pseudo-random data, so reads hit real blocks and
//!   compressing storage cannot cheat
//! - regular file: open in place with the requested open flags, never
//!   resized
//! - block device: open raw, size taken from the `BLKGETSIZE64` ioctl
//!
//! Writing to a block device destroys whatever lives there, so it demands
//! the write flag given three times. Files and directory temp files need it
//! once.
//!
//! Filesystem type and backing device are resolved from
//! `/proc/self/mountinfo` for display only; failure to resolve them never
//! fails the run.

use crate::rng::Xorshift128Plus;
use crate::util::time::format_size;
use crate::RunError;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, FileTypeExt, OpenOptionsExt};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

#[cfg(target_os = "linux")]
const BLKGETSIZE64: libc::c_ulong = 0x80081272;

const FILL_CHUNK: usize = 64 * 1024;

/// What kind of object the target path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Directory,
    File,
    Device,
}

/// Everything target preparation needs to know.
#[derive(Debug, Clone)]
pub struct TargetOptions {
    pub path: PathBuf,
    pub request_size: u64,
    pub offset: u64,
    /// Explicit working set, if given on the command line.
    pub working_set: Option<u64>,
    /// Working set used for directory temp files when none is given.
    pub default_working_set: u64,
    /// How many times the write flag was given.
    pub write_level: u8,
    /// Alternating write/read mode also writes.
    pub ping_pong: bool,
    pub direct: bool,
    pub sync: bool,
    pub dsync: bool,
    pub cached: bool,
}

impl TargetOptions {
    pub fn writes(&self) -> bool {
        self.write_level > 0 || self.ping_pong
    }

    fn custom_flags(&self) -> libc::c_int {
        let mut flags = 0;
        if self.direct {
            flags |= libc::O_DIRECT;
        }
        if self.sync {
            flags |= libc::O_SYNC;
        }
        if self.dsync {
            flags |= libc::O_DSYNC;
        }
        flags
    }
}

/// An open, validated target ready for requests.
#[derive(Debug)]
pub struct TargetHandle {
    file: File,
    pub path: PathBuf,
    pub kind: TargetKind,
    /// Total usable size in bytes (device/file size, or the temp file's
    /// extent for directory targets).
    pub size: u64,
    pub offset: u64,
    pub working_set: u64,
    pub fstype: Option<String>,
    pub device: Option<String>,
}

impl TargetHandle {
    pub fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Hint that the working window will be accessed in random order.
    /// Best-effort; some filesystems do not care.
    pub fn advise_random(&self) {
        #[cfg(target_os = "linux")]
        {
            // SAFETY: fd is open, and posix_fadvise has no side effects
            // beyond cache hints.
            let rc = unsafe {
                libc::posix_fadvise(
                    self.fd(),
                    self.offset as libc::off_t,
                    self.working_set as libc::off_t,
                    libc::POSIX_FADV_RANDOM,
                )
            };
            if rc != 0 {
                eprintln!(
                    "warning: posix_fadvise(RANDOM) failed on {}: {}",
                    self.path.display(),
                    io::Error::from_raw_os_error(rc)
                );
            }
        }
    }

    /// Evict the request's pages from the cache so the next access touches
    /// storage. Returns the raw error so the caller can abort the run.
    pub fn advise_dontneed(&self, offset: u64, len: u64) -> io::Result<()> {
        #[cfg(target_os = "linux")]
        {
            // SAFETY: as above.
            let rc = unsafe {
                libc::posix_fadvise(
                    self.fd(),
                    offset as libc::off_t,
                    len as libc::off_t,
                    libc::POSIX_FADV_DONTNEED,
                )
            };
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }
        }
        #[cfg(not(target_os = "linux"))]
        let _ = (offset, len);
        Ok(())
    }

    /// Human-readable location string, e.g. `ext4 /dev/sda1 117.6 GiB`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(fstype) = &self.fstype {
            parts.push(fstype.clone());
        }
        if let Some(device) = &self.device {
            parts.push(device.clone());
        }
        parts.push(format_size(self.size));
        parts.join(" ")
    }
}

/// Stat the path, open it appropriately, and validate the geometry.
pub fn prepare(
    opts: &TargetOptions,
    rng: &mut Xorshift128Plus,
) -> std::result::Result<TargetHandle, RunError> {
    let meta = std::fs::metadata(&opts.path).map_err(|e| {
        RunError::Setup(
            anyhow::Error::from(e).context(format!("failed to stat {}", opts.path.display())),
        )
    })?;

    let file_type = meta.file_type();
    if file_type.is_dir() {
        prepare_directory(opts, rng)
    } else if file_type.is_file() {
        prepare_file(opts, meta.len())
    } else if file_type.is_block_device() || file_type.is_char_device() {
        prepare_device(opts)
    } else {
        Err(RunError::Config(anyhow::anyhow!(
            "unsupported target type: {}",
            opts.path.display()
        )))
    }
}

fn prepare_directory(
    opts: &TargetOptions,
    rng: &mut Xorshift128Plus,
) -> std::result::Result<TargetHandle, RunError> {
    let working_set = opts
        .working_set
        .unwrap_or_else(|| opts.default_working_set.max(opts.request_size));
    if working_set < opts.request_size {
        return Err(geometry_error(working_set, opts));
    }
    let size = opts.offset + working_set;

    // Unlinked so a crash leaves nothing behind.
    let file = tempfile::tempfile_in(&opts.path).map_err(|e| {
        RunError::Setup(anyhow::Error::from(e).context(format!(
            "failed to create temporary file in {}",
            opts.path.display()
        )))
    })?;

    fill_window(&file, rng, opts.offset, working_set)
        .map_err(|e| RunError::Setup(anyhow::Error::from(e).context("failed to fill temp file")))?;

    // Status flags go on after the buffered fill; O_DIRECT would demand an
    // aligned fill buffer otherwise.
    let custom = opts.custom_flags();
    if custom != 0 {
        // SAFETY: fd is open; F_SETFL with file status flags is benign.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETFL, custom) };
        if rc < 0 {
            return Err(RunError::Setup(
                anyhow::Error::from(io::Error::last_os_error())
                    .context("fcntl(F_SETFL) failed on temp file"),
            ));
        }
    }

    let (fstype, device) = filesystem_info(&opts.path).unzip();
    Ok(TargetHandle {
        file,
        path: opts.path.clone(),
        kind: TargetKind::Directory,
        size,
        offset: opts.offset,
        working_set,
        fstype,
        device,
    })
}

fn prepare_file(
    opts: &TargetOptions,
    size: u64,
) -> std::result::Result<TargetHandle, RunError> {
    if size == 0 {
        return Err(RunError::Config(anyhow::anyhow!(
            "target file is empty: {}",
            opts.path.display()
        )));
    }

    let working_set = validate_geometry(size, opts)?;

    let file = open_target(opts)?;
    let (fstype, device) = filesystem_info(&opts.path).unzip();
    Ok(TargetHandle {
        file,
        path: opts.path.clone(),
        kind: TargetKind::File,
        size,
        offset: opts.offset,
        working_set,
        fstype,
        device,
    })
}

fn prepare_device(opts: &TargetOptions) -> std::result::Result<TargetHandle, RunError> {
    // Raw device writes are destructive; demand deliberate repetition.
    if opts.writes() && opts.write_level < 3 {
        return Err(RunError::Config(anyhow::anyhow!(
            "writing to a block device destroys its contents; \
             give the write flag three times to confirm"
        )));
    }

    let file = open_target(opts)?;
    let size = device_size(&file).map_err(|e| {
        RunError::Setup(anyhow::Error::from(e).context(format!(
            "failed to read device size of {}",
            opts.path.display()
        )))
    })?;

    let working_set = validate_geometry(size, opts)?;

    Ok(TargetHandle {
        file,
        path: opts.path.clone(),
        kind: TargetKind::Device,
        size,
        offset: opts.offset,
        working_set,
        fstype: None,
        device: None,
    })
}

fn open_target(opts: &TargetOptions) -> std::result::Result<File, RunError> {
    let mut options = OpenOptions::new();
    options.read(true);
    if opts.writes() {
        options.write(true);
    }
    let custom = opts.custom_flags();
    if custom != 0 {
        options.custom_flags(custom);
    }
    options.open(&opts.path).map_err(|e| {
        RunError::Setup(
            anyhow::Error::from(e).context(format!("failed to open {}", opts.path.display())),
        )
    })
}

/// Clamp and check `request_size <= working_set <= size - offset`.
fn validate_geometry(
    size: u64,
    opts: &TargetOptions,
) -> std::result::Result<u64, RunError> {
    let available = size.saturating_sub(opts.offset);
    let working_set = match opts.working_set {
        Some(ws) if ws > available => return Err(geometry_error(ws, opts)),
        Some(ws) => ws,
        None => available,
    };
    if working_set < opts.request_size {
        return Err(geometry_error(working_set, opts));
    }
    Ok(working_set)
}

fn geometry_error(working_set: u64, opts: &TargetOptions) -> RunError {
    RunError::Config(anyhow::anyhow!(
        "invalid geometry for {}: request size {} does not fit \
         working set {} at offset {}",
        opts.path.display(),
        format_size(opts.request_size),
        format_size(working_set),
        format_size(opts.offset),
    ))
}

fn fill_window(file: &File, rng: &mut Xorshift128Plus, offset: u64, len: u64) -> io::Result<()> {
    let mut chunk = vec![0u8; FILL_CHUNK];
    let mut filled = 0u64;
    while filled < len {
        let n = chunk.len().min((len - filled) as usize);
        rng.fill_bytes(&mut chunk[..n]);
        file.write_all_at(&chunk[..n], offset + filled)?;
        filled += n as u64;
    }
    file.sync_all()
}

#[cfg(target_os = "linux")]
fn device_size(file: &File) -> io::Result<u64> {
    let mut size: u64 = 0;
    // SAFETY: BLKGETSIZE64 writes a u64 through the pointer.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64, &mut size) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(size)
}

#[cfg(not(target_os = "linux"))]
fn device_size(_file: &File) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "device size detection is only supported on Linux",
    ))
}

/// Resolve (fstype, source device) for the mount containing `path`.
fn filesystem_info(path: &Path) -> Option<(String, String)> {
    let canonical = std::fs::canonicalize(path).ok()?;
    let mounts = std::fs::read_to_string("/proc/self/mountinfo").ok()?;

    let mut best: Option<(PathBuf, String, String)> = None;
    for line in mounts.lines() {
        let (head, tail) = match line.split_once(" - ") {
            Some(pair) => pair,
            None => continue,
        };
        let mount_point = match head.split_whitespace().nth(4) {
            Some(mp) => PathBuf::from(unescape_mount(mp)),
            None => continue,
        };
        let mut rest = tail.split_whitespace();
        let (fstype, source) = match (rest.next(), rest.next()) {
            (Some(f), Some(s)) => (f, s),
            _ => continue,
        };

        if canonical.starts_with(&mount_point) {
            let longer = best
                .as_ref()
                .map_or(true, |(prev, _, _)| mount_point.as_os_str().len() > prev.as_os_str().len());
            if longer {
                best = Some((mount_point, fstype.to_string(), source.to_string()));
            }
        }
    }
    best.map(|(_, fstype, source)| (fstype, source))
}

/// Undo the octal escapes mountinfo uses for spaces, tabs, and backslashes.
fn unescape_mount(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if let (Some(&a), Some(&b), Some(&c)) =
                (bytes.get(i + 1), bytes.get(i + 2), bytes.get(i + 3))
            {
                if a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit() {
                    let value = (a - b'0') * 64 + (b - b'0') * 8 + (c - b'0');
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(path: PathBuf) -> TargetOptions {
        TargetOptions {
            path,
            request_size: 4096,
            offset: 0,
            working_set: None,
            default_working_set: 1 << 20,
            write_level: 0,
            ping_pong: false,
            direct: false,
            sync: false,
            dsync: false,
            cached: true,
        }
    }

    #[test]
    fn test_directory_target() {
        let dir = TempDir::new().unwrap();
        let mut rng = Xorshift128Plus::seeded(1);

        let handle = prepare(&options(dir.path().to_path_buf()), &mut rng).unwrap();
        assert_eq!(handle.kind, TargetKind::Directory);
        assert_eq!(handle.working_set, 1 << 20);
        assert_eq!(handle.size, 1 << 20);

        // The fill must be readable back through the fd.
        let mut buf = vec![0u8; 4096];
        handle.file.read_exact_at(&mut buf, 0).unwrap();
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_directory_target_with_offset() {
        let dir = TempDir::new().unwrap();
        let mut rng = Xorshift128Plus::seeded(2);

        let mut opts = options(dir.path().to_path_buf());
        opts.offset = 8192;
        opts.working_set = Some(64 * 1024);

        let handle = prepare(&opts, &mut rng).unwrap();
        assert_eq!(handle.offset, 8192);
        assert_eq!(handle.working_set, 64 * 1024);
        assert_eq!(handle.size, 8192 + 64 * 1024);
    }

    #[test]
    fn test_file_target_geometry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, vec![0u8; 64 * 1024]).unwrap();
        let mut rng = Xorshift128Plus::seeded(3);

        let handle = prepare(&options(path), &mut rng).unwrap();
        assert_eq!(handle.kind, TargetKind::File);
        assert_eq!(handle.size, 64 * 1024);
        assert_eq!(handle.working_set, 64 * 1024);
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        let mut rng = Xorshift128Plus::seeded(4);

        let err = prepare(&options(path), &mut rng).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_working_set_beyond_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small");
        std::fs::write(&path, vec![0u8; 8192]).unwrap();
        let mut rng = Xorshift128Plus::seeded(5);

        let mut opts = options(path);
        opts.working_set = Some(1 << 20);
        let err = prepare(&opts, &mut rng).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_request_larger_than_working_set_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();
        let mut rng = Xorshift128Plus::seeded(6);

        let err = prepare(&options(path), &mut rng).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_target_is_setup_error() {
        let mut rng = Xorshift128Plus::seeded(7);
        let err = prepare(&options(PathBuf::from("/no/such/path")), &mut rng).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_device_write_needs_triple_flag() {
        let mut rng = Xorshift128Plus::seeded(8);
        let mut opts = options(PathBuf::from("/dev/null"));
        opts.write_level = 1;

        let err = prepare(&opts, &mut rng).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_unescape_mount() {
        assert_eq!(unescape_mount("/mnt/with\\040space"), "/mnt/with space");
        assert_eq!(unescape_mount("/plain"), "/plain");
        assert_eq!(unescape_mount("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_describe_contains_size() {
        let dir = TempDir::new().unwrap();
        let mut rng = Xorshift128Plus::seeded(9);
        let handle = prepare(&options(dir.path().to_path_buf()), &mut rng).unwrap();
        assert!(handle.describe().contains("1.0 MiB"));
    }
}
