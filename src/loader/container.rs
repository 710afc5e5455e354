//! Container negotiation and member access.
//!
//! A dump container holds an index member plus one content member per
//! indexed region. Encodings are tried in a fixed order: a plain tar, a tar
//! wrapped in gzip, a zip, and finally a flat directory.

use bytes::Bytes;
use flate2::read::GzDecoder;
use memmap2::Mmap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{LoadError, Result};
use super::tar::{self, TarEntry};
use super::zip::{self, ZipEntry};
use crate::config::LoaderConfig;
use crate::mappings::FileView;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContainerKind {
    Tar,
    GzipTar,
    Zip,
    Directory,
}

impl ContainerKind {
    /// Whether members can be read at arbitrary offsets without extraction.
    pub fn supports_random_access(self) -> bool {
        matches!(self, ContainerKind::Tar | ContainerKind::Directory)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Tar => write!(f, "tar"),
            ContainerKind::GzipTar => write!(f, "tar.gz"),
            ContainerKind::Zip => write!(f, "zip"),
            ContainerKind::Directory => write!(f, "directory"),
        }
    }
}

enum Members {
    Tar {
        map: Arc<Mmap>,
        entries: HashMap<String, TarEntry>,
    },
    GzipTar {
        data: Bytes,
        entries: HashMap<String, TarEntry>,
    },
    Zip {
        map: Arc<Mmap>,
        entries: HashMap<String, ZipEntry>,
    },
    Directory {
        root: PathBuf,
        names: BTreeSet<String>,
    },
}

/// An opened, validated dump container.
pub struct Container {
    path: PathBuf,
    kind: ContainerKind,
    index_name: String,
    members: Members,
}

impl Container {
    /// Open `path` and validate it as a dump container.
    ///
    /// # Errors
    /// `UnrecognizedContainer` if no encoding matches or the index member or
    /// region members are missing; `CorruptArchive` if an encoding matches
    /// but its structure is damaged.
    pub fn open(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let unrecognized = |reason: String| LoadError::UnrecognizedContainer {
            path: path.to_path_buf(),
            reason,
        };

        let members = if path.is_dir() {
            Self::open_directory(path)?
        } else {
            let file = File::open(path)?;
            if file.metadata()?.len() == 0 {
                return Err(unrecognized("file is empty".to_string()));
            }
            // Safety: read-only map of a regular file.
            let map = unsafe { Mmap::map(&file)? };
            Self::negotiate(map).ok_or_else(|| unrecognized("unknown container encoding".to_string()))??
        };

        let container = Container {
            path: path.to_path_buf(),
            kind: members.kind(),
            index_name: config.index_entry_name.clone(),
            members,
        };

        if !container.has_member(&container.index_name) {
            return Err(unrecognized(format!(
                "no '{}' index member",
                container.index_name
            )));
        }
        if !container
            .member_names()
            .iter()
            .any(|name| name.contains(config.range_marker.as_str()))
        {
            return Err(unrecognized(format!(
                "no member name contains '{}'",
                config.range_marker
            )));
        }

        info!(path = %path.display(), kind = %container.kind, "Opened dump container");
        Ok(Arc::new(container))
    }

    /// Try each archive encoding in turn; `None` if none of them matches.
    fn negotiate(map: Mmap) -> Option<Result<Members>> {
        if tar::looks_like_tar(&map) {
            debug!("Container is a tar archive");
            return Some(tar::read_entries(&map).map(|entries| Members::Tar {
                map: Arc::new(map),
                entries,
            }));
        }
        if map.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::new();
            if let Err(err) = GzDecoder::new(&map[..]).read_to_end(&mut inflated) {
                return Some(Err(LoadError::corrupt("gzip", format!("cannot inflate: {}", err))));
            }
            if tar::looks_like_tar(&inflated) {
                debug!("Container is a gzip-compressed tar archive");
                return Some(tar::read_entries(&inflated).map(|entries| Members::GzipTar {
                    data: Bytes::from(inflated),
                    entries,
                }));
            }
        }
        if zip::looks_like_zip(&map) {
            debug!("Container is a zip archive");
            return Some(zip::read_entries(&map).map(|entries| Members::Zip {
                map: Arc::new(map),
                entries,
            }));
        }
        None
    }

    fn open_directory(root: &Path) -> Result<Members> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(Members::Directory {
            root: root.to_path_buf(),
            names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn member_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = match &self.members {
            Members::Tar { entries, .. } | Members::GzipTar { entries, .. } => {
                entries.keys().map(String::as_str).collect()
            }
            Members::Zip { entries, .. } => entries.keys().map(String::as_str).collect(),
            Members::Directory { names, .. } => names.iter().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }

    pub fn has_member(&self, name: &str) -> bool {
        match &self.members {
            Members::Tar { entries, .. } | Members::GzipTar { entries, .. } => {
                entries.contains_key(name)
            }
            Members::Zip { entries, .. } => entries.contains_key(name),
            Members::Directory { names, .. } => names.contains(name),
        }
    }

    /// First candidate name present in the container.
    pub fn resolve<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        candidates
            .iter()
            .map(String::as_str)
            .find(|name| self.has_member(name))
    }

    /// Size of a member's content, if known without extracting it.
    pub fn member_len(&self, name: &str) -> Option<u64> {
        match &self.members {
            Members::Tar { entries, .. } | Members::GzipTar { entries, .. } => {
                entries.get(name).map(|e| e.size as u64)
            }
            Members::Zip { entries, .. } => entries.get(name).map(|e| e.uncompressed_size as u64),
            Members::Directory { root, names } => names
                .contains(name)
                .then(|| fs::metadata(root.join(name)).ok().map(|m| m.len()))
                .flatten(),
        }
    }

    /// The index member as text.
    pub fn read_index(&self) -> Result<String> {
        let raw = self.whole(&self.index_name)?;
        String::from_utf8(raw.to_vec()).map_err(|e| {
            let valid = &raw[..e.utf8_error().valid_up_to()];
            LoadError::MalformedIndex {
                line: memchr::memchr_iter(b'\n', valid).count() + 1,
                record: String::new(),
                reason: "index is not valid UTF-8".to_string(),
            }
        })
    }

    /// Extract a member's full content.
    pub fn whole(&self, name: &str) -> io::Result<Bytes> {
        match &self.members {
            Members::Tar { map, entries } => {
                let e = lookup(entries, name)?;
                Ok(Bytes::copy_from_slice(&map[e.data_offset..e.data_offset + e.size]))
            }
            Members::GzipTar { data, entries } => {
                let e = lookup(entries, name)?;
                Ok(data.slice(e.data_offset..e.data_offset + e.size))
            }
            Members::Zip { map, entries } => zip::extract(map, lookup(entries, name)?),
            Members::Directory { root, names } => {
                if !names.contains(name) {
                    return Err(missing(name));
                }
                Ok(Bytes::from(fs::read(root.join(name))?))
            }
        }
    }

    /// A read-only mapped view of a member, for random-access containers.
    pub fn view(&self, name: &str) -> io::Result<FileView> {
        match &self.members {
            Members::Tar { map, entries } => {
                let e = lookup(entries, name)?;
                FileView::new(Arc::clone(map), e.data_offset, e.size)
            }
            Members::Directory { root, names } => {
                if !names.contains(name) {
                    return Err(missing(name));
                }
                let file = File::open(root.join(name))?;
                // Safety: read-only map of a regular file.
                let map = unsafe { Mmap::map(&file)? };
                let len = map.len();
                FileView::new(Arc::new(map), 0, len)
            }
            Members::GzipTar { .. } | Members::Zip { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} members cannot be mapped", self.kind),
            )),
        }
    }
}

impl Members {
    fn kind(&self) -> ContainerKind {
        match self {
            Members::Tar { .. } => ContainerKind::Tar,
            Members::GzipTar { .. } => ContainerKind::GzipTar,
            Members::Zip { .. } => ContainerKind::Zip,
            Members::Directory { .. } => ContainerKind::Directory,
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("index_name", &self.index_name)
            .finish()
    }
}

fn lookup<'a, T>(entries: &'a HashMap<String, T>, name: &str) -> io::Result<&'a T> {
    entries.get(name).ok_or_else(|| missing(name))
}

fn missing(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no member named '{}'", name),
    )
}
