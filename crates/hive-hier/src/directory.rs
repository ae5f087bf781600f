//! Filesystem-backed hierarchical medium.
//!
//! Each key is a directory below a root; each value is a file named
//! `<name>.value` inside it. A value file starts with one shape byte:
//!
//! | Byte  | Shape      | Payload                                   |
//! |-------|------------|-------------------------------------------|
//! | `S`   | string     | UTF-8 text                                |
//! | `I`   | integer    | 4 bytes, little-endian                    |
//! | `M`   | string list| repeated (u32 LE byte length, UTF-8 text) |
//! | `B`   | bytes      | raw bytes                                 |
//!
//! A value written with a kind tag is prefixed by `K`, one length byte and
//! the ASCII tag, followed by the shape byte and payload as above.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hive_types::Primitive;
use tracing::debug;

use crate::error::{MediumError, MediumResult};
use crate::medium::{HierarchicalMedium, MediumKey, SEPARATOR};

const VALUE_SUFFIX: &str = ".value";

/// A registry-like medium laid out as directories and value files.
#[derive(Clone, Debug)]
pub struct DirectoryMedium {
    root: PathBuf,
    separator: char,
}

impl DirectoryMedium {
    /// Use `root` as the root key, creating the directory if missing.
    pub fn open(root: impl Into<PathBuf>) -> MediumResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened directory medium");
        Ok(Self {
            root,
            separator: SEPARATOR,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, path: &str) -> MediumResult<PathBuf> {
        let mut dir = self.root.clone();
        for segment in path.split(self.separator).filter(|s| !s.is_empty()) {
            check_name(segment)?;
            dir.push(segment);
        }
        Ok(dir)
    }

    fn handle(&self, path: &str, dir: PathBuf, writable: bool) -> Box<dyn MediumKey> {
        Box::new(DirectoryKey {
            path: path.to_string(),
            dir,
            writable,
        })
    }
}

impl HierarchicalMedium for DirectoryMedium {
    fn separator(&self) -> char {
        self.separator
    }

    fn open_key(&self, path: &str, writable: bool) -> MediumResult<Option<Box<dyn MediumKey>>> {
        let dir = self.dir_for(path)?;
        if dir.is_dir() {
            Ok(Some(self.handle(path, dir, writable)))
        } else {
            Ok(None)
        }
    }

    fn create_key(&self, path: &str) -> MediumResult<Box<dyn MediumKey>> {
        let dir = self.dir_for(path)?;
        fs::create_dir_all(&dir)?;
        Ok(self.handle(path, dir, true))
    }

    fn delete_key_tree(&self, path: &str) -> MediumResult<()> {
        let dir = self.dir_for(path)?;
        if dir == self.root {
            // Empty the root but keep it.
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    fs::remove_dir_all(entry.path())?;
                } else {
                    fs::remove_file(entry.path())?;
                }
            }
            return Ok(());
        }
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(path, "deleted key tree");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_name(name: &str) -> MediumResult<()> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name == "." || name == ".." {
        "reserved name"
    } else if name.contains(['/', '\\', '\0']) {
        "contains a path separator"
    } else {
        return Ok(());
    };
    Err(MediumError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

struct DirectoryKey {
    path: String,
    dir: PathBuf,
    writable: bool,
}

impl DirectoryKey {
    fn value_file(&self, name: &str) -> MediumResult<PathBuf> {
        check_name(name)?;
        Ok(self.dir.join(format!("{name}{VALUE_SUFFIX}")))
    }

    fn ensure_present(&self) -> MediumResult<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(MediumError::KeyNotFound(self.path.clone()))
        }
    }

    fn ensure_writable(&self) -> MediumResult<()> {
        if !self.writable {
            return Err(MediumError::ReadOnly(self.path.clone()));
        }
        self.ensure_present()
    }

    fn entries(&self, want_dirs: bool) -> MediumResult<Vec<String>> {
        self.ensure_present()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let is_dir = entry.file_type()?.is_dir();
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if want_dirs && is_dir {
                names.push(file_name);
            } else if !want_dirs && !is_dir {
                if let Some(name) = file_name.strip_suffix(VALUE_SUFFIX) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn read_record(&self, name: &str) -> MediumResult<Option<(Primitive, Option<String>)>> {
        self.ensure_present()?;
        let bytes = match fs::read(self.value_file(name)?) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_value(&bytes)
            .map(Some)
            .map_err(|reason| self.corrupt(name, reason))
    }

    fn corrupt(&self, name: &str, reason: impl Into<String>) -> MediumError {
        MediumError::Corrupt {
            path: self.path.clone(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl MediumKey for DirectoryKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn value_names(&self) -> MediumResult<Vec<String>> {
        self.entries(false)
    }

    fn get_value(&self, name: &str) -> MediumResult<Option<Primitive>> {
        Ok(self.read_record(name)?.map(|(value, _)| value))
    }

    fn set_value(&mut self, name: &str, value: Primitive) -> MediumResult<()> {
        self.ensure_writable()?;
        fs::write(self.value_file(name)?, encode_value(&value, None))?;
        Ok(())
    }

    fn value_kind(&self, name: &str) -> MediumResult<Option<String>> {
        Ok(self.read_record(name)?.and_then(|(_, kind)| kind))
    }

    fn set_tagged_value(&mut self, name: &str, value: Primitive, kind: &str) -> MediumResult<()> {
        self.ensure_writable()?;
        fs::write(self.value_file(name)?, encode_value(&value, Some(kind)))?;
        Ok(())
    }

    fn delete_value(&mut self, name: &str) -> MediumResult<()> {
        self.ensure_writable()?;
        match fs::remove_file(self.value_file(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn subkey_names(&self) -> MediumResult<Vec<String>> {
        self.entries(true)
    }
}

// ---------------------------------------------------------------------------
// Value file encoding
// ---------------------------------------------------------------------------

fn encode_value(value: &Primitive, kind: Option<&str>) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(kind) = kind {
        if let Ok(len) = u8::try_from(kind.len()) {
            out.push(b'K');
            out.push(len);
            out.extend_from_slice(kind.as_bytes());
        }
    }
    out.extend(encode_shape(value));
    out
}

fn encode_shape(value: &Primitive) -> Vec<u8> {
    match value {
        Primitive::Str(s) => [b"S".as_slice(), s.as_bytes()].concat(),
        Primitive::Int(i) => [b"I".as_slice(), i.to_le_bytes().as_slice()].concat(),
        Primitive::Strings(items) => {
            let mut out = vec![b'M'];
            for item in items {
                out.extend_from_slice(&(item.len() as u32).to_le_bytes());
                out.extend_from_slice(item.as_bytes());
            }
            out
        }
        Primitive::Bytes(bytes) => [b"B".as_slice(), bytes.as_slice()].concat(),
    }
}

fn decode_value(bytes: &[u8]) -> Result<(Primitive, Option<String>), String> {
    let Some(tagged) = bytes.strip_prefix(b"K") else {
        return Ok((decode_shape(bytes)?, None));
    };
    let (&len, rest) = tagged.split_first().ok_or("truncated kind tag")?;
    let len = usize::from(len);
    if rest.len() < len {
        return Err("truncated kind tag".into());
    }
    let (kind, rest) = rest.split_at(len);
    let kind = String::from_utf8(kind.to_vec()).map_err(|e| e.to_string())?;
    Ok((decode_shape(rest)?, Some(kind)))
}

fn decode_shape(bytes: &[u8]) -> Result<Primitive, String> {
    let (&shape, body) = bytes.split_first().ok_or("empty value file")?;
    match shape {
        b'S' => String::from_utf8(body.to_vec())
            .map(Primitive::Str)
            .map_err(|e| e.to_string()),
        b'I' => {
            let raw: [u8; 4] = body
                .try_into()
                .map_err(|_| format!("integer needs 4 bytes, found {}", body.len()))?;
            Ok(Primitive::Int(i32::from_le_bytes(raw)))
        }
        b'M' => {
            let mut items = Vec::new();
            let mut rest = body;
            while !rest.is_empty() {
                if rest.len() < 4 {
                    return Err("truncated string length".into());
                }
                let (len, tail) = rest.split_at(4);
                let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
                if tail.len() < len {
                    return Err("truncated string".into());
                }
                let (item, tail) = tail.split_at(len);
                items.push(String::from_utf8(item.to_vec()).map_err(|e| e.to_string())?);
                rest = tail;
            }
            Ok(Primitive::Strings(items))
        }
        b'B' => Ok(Primitive::Bytes(body.to_vec())),
        other => Err(format!("unknown shape byte 0x{other:02x}")),
    }
}
