//! Mount-priority resolution.
//!
//! Every override source carries a small on-disk descriptor declaring its
//! mount priority — the integer precedence deciding which pack wins when
//! several override the same texture path. Each game target stores the
//! descriptor differently; the format is selected purely from the
//! [`GameTarget`] the caller was configured with, never by probing file
//! contents.

use std::io::Read;

use byteorder::{ByteOrder, LE};
use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{Error, Result};

/// LE2 `Mount.dlc` fixed record: five u32 version/id fields, a 16-byte TFC
/// guid, then two more u32 fields. The module id sits at offset 12.
const LE2_MOUNT_SIZE: usize = 44;
const LE2_MODULE_ID_OFFSET: usize = 12;

/// LE3 `Mount.dlc` fixed record: nine u32 fields, module id fifth.
const LE3_MOUNT_SIZE: usize = 36;
const LE3_MODULE_ID_OFFSET: usize = 16;

/// Which game the override sources are authored for.
///
/// Selected by configuration at startup; it decides both the mount
/// descriptor format and the salt used for manifest target hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameTarget {
    Le1,
    Le2,
    Le3,
}

impl GameTarget {
    /// Target name used as the manifest hash salt.
    pub fn name(self) -> &'static str {
        match self {
            GameTarget::Le1 => "LE1",
            GameTarget::Le2 => "LE2",
            GameTarget::Le3 => "LE3",
        }
    }
}

/// Read the mount priority of the override source at `source_dir`.
///
/// Returns a non-negative priority (higher mounts first) or an error, in
/// which case the caller must skip the source entirely.
pub fn read_mount_priority(source_dir: &Utf8Path, game: GameTarget) -> Result<i32> {
    match game {
        // LE1 uses the autoload mechanism, mount priority is in the .ini file.
        GameTarget::Le1 => read_autoload_mount(&source_dir.join("AutoLoad.ini")),
        GameTarget::Le2 => read_binary_mount(
            &source_dir.join("CookedPCConsole").join("Mount.dlc"),
            LE2_MOUNT_SIZE,
            LE2_MODULE_ID_OFFSET,
        ),
        GameTarget::Le3 => read_binary_mount(
            &source_dir.join("CookedPCConsole").join("Mount.dlc"),
            LE3_MOUNT_SIZE,
            LE3_MODULE_ID_OFFSET,
        ),
    }
}

/// Scan an `AutoLoad.ini` line by line for `ModMount = <int>`.
///
/// The first non-negative match wins. A negative value is remembered as an
/// error but scanning continues, in case a later line carries a valid one.
fn read_autoload_mount(path: &Utf8Path) -> Result<i32> {
    let contents = std::fs::read_to_string(path.as_std_path())?;

    let mut last_error = None;
    for line in contents.lines() {
        let Some(value) = parse_mod_mount_line(line) else {
            continue;
        };
        if value >= 0 {
            return Ok(value);
        }
        last_error = Some(Error::NegativeMountPriority { path: path.to_owned(), value });
    }

    Err(last_error.unwrap_or_else(|| Error::MountLineMissing(path.to_owned())))
}

/// Parse one `ModMount = <int>` assignment, tolerating surrounding spaces.
fn parse_mod_mount_line(line: &str) -> Option<i32> {
    let (key, value) = line.split_once('=')?;
    if key.trim() != "ModMount" {
        return None;
    }
    value.trim().parse().ok()
}

/// Read the designated module-id field out of a fixed binary mount record.
fn read_binary_mount(path: &Utf8Path, record_size: usize, field_offset: usize) -> Result<i32> {
    let mut file = std::fs::File::open(path.as_std_path())?;

    let mut record = vec![0u8; record_size];
    let mut filled = 0;
    while filled < record.len() {
        let read = file.read(&mut record[filled..])?;
        if read == 0 {
            return Err(Error::MountRecordTooShort {
                path: path.to_owned(),
                expected: record_size,
                actual: filled,
            });
        }
        filled += read;
    }

    Ok(LE::read_u32(&record[field_offset..]) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    fn write_autoload(dir: &Utf8Path, contents: &str) {
        std::fs::write(dir.join("AutoLoad.ini").as_std_path(), contents).unwrap();
    }

    fn write_mount_dlc(dir: &Utf8Path, bytes: &[u8]) {
        let cooked = dir.join("CookedPCConsole");
        std::fs::create_dir_all(cooked.as_std_path()).unwrap();
        std::fs::write(cooked.join("Mount.dlc").as_std_path(), bytes).unwrap();
    }

    #[test]
    fn le1_reads_mod_mount_line() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);
        write_autoload(&root, "[ME1DLCMOUNT]\nModName = Example\n ModMount = 120 \n");
        assert_eq!(read_mount_priority(&root, GameTarget::Le1).unwrap(), 120);
    }

    #[test]
    fn le1_missing_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);
        write_autoload(&root, "[ME1DLCMOUNT]\nModName = Example\n");
        assert!(matches!(
            read_mount_priority(&root, GameTarget::Le1),
            Err(Error::MountLineMissing(_))
        ));
    }

    #[test]
    fn le1_negative_value_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);
        write_autoload(&root, "ModMount = -5\n");
        assert!(matches!(
            read_mount_priority(&root, GameTarget::Le1),
            Err(Error::NegativeMountPriority { value: -5, .. })
        ));
    }

    #[test]
    fn le1_later_valid_line_wins_over_negative() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);
        write_autoload(&root, "ModMount = -5\nModMount = 42\n");
        assert_eq!(read_mount_priority(&root, GameTarget::Le1).unwrap(), 42);
    }

    #[test]
    fn le1_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);
        assert!(matches!(read_mount_priority(&root, GameTarget::Le1), Err(Error::Io(_))));
    }

    #[test]
    fn le2_reads_module_id() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);

        let mut record = vec![0u8; LE2_MOUNT_SIZE];
        record[LE2_MODULE_ID_OFFSET..LE2_MODULE_ID_OFFSET + 4].copy_from_slice(&300u32.to_le_bytes());
        write_mount_dlc(&root, &record);

        assert_eq!(read_mount_priority(&root, GameTarget::Le2).unwrap(), 300);
    }

    #[test]
    fn le3_reads_module_id_at_its_own_offset() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);

        let mut record = vec![0u8; LE3_MOUNT_SIZE];
        record[LE3_MODULE_ID_OFFSET..LE3_MODULE_ID_OFFSET + 4].copy_from_slice(&3200u32.to_le_bytes());
        write_mount_dlc(&root, &record);

        assert_eq!(read_mount_priority(&root, GameTarget::Le3).unwrap(), 3200);
    }

    #[test]
    fn short_mount_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir_path(&dir);
        write_mount_dlc(&root, &[0u8; 10]);

        assert!(matches!(
            read_mount_priority(&root, GameTarget::Le2),
            Err(Error::MountRecordTooShort { expected: LE2_MOUNT_SIZE, actual: 10, .. })
        ));
    }
}
