//! Permission flags for captured memory regions.

use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

use super::error::RegionError;

bitflags! {
    /// Access flags of a region, as recorded at capture time.
    ///
    /// Parsed from `/proc/<pid>/maps`-style strings (`"r-xp"`), from the
    /// four-character dump default (`"rwx-"`) and from Windows protection
    /// renderings where `c` in the write slot marks copy-on-write (`"rc-"`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Perms: u8 {
        const READ = 1;
        const WRITE = 2;
        const EXECUTE = 4;
        const COPY_ON_WRITE = 8;
        const PRIVATE = 16;
        const SHARED = 32;
    }
}

impl Perms {
    pub fn is_readable(&self) -> bool {
        self.contains(Perms::READ)
    }

    pub fn is_writable(&self) -> bool {
        self.contains(Perms::WRITE)
    }

    pub fn is_executable(&self) -> bool {
        self.contains(Perms::EXECUTE)
    }

    pub fn is_copy_on_write(&self) -> bool {
        self.contains(Perms::COPY_ON_WRITE)
    }
}

impl FromStr for Perms {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RegionError::InvalidPermissions(s.to_string());
        if s.is_empty() || s.len() > 4 {
            return Err(invalid());
        }

        let mut perms = Perms::empty();
        for (slot, c) in s.chars().enumerate() {
            perms |= match (slot, c) {
                (_, '-') => Perms::empty(),
                (0, 'r') => Perms::READ,
                (1, 'w') => Perms::WRITE,
                (1, 'c') => Perms::WRITE | Perms::COPY_ON_WRITE,
                (2, 'x') => Perms::EXECUTE,
                (3, 'p') => Perms::PRIVATE,
                (3, 's') => Perms::SHARED,
                _ => return Err(invalid()),
            };
        }
        Ok(perms)
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(4);
        out.push(if self.is_readable() { 'r' } else { '-' });
        out.push(if self.is_copy_on_write() {
            'c'
        } else if self.is_writable() {
            'w'
        } else {
            '-'
        });
        out.push(if self.is_executable() { 'x' } else { '-' });
        out.push(if self.contains(Perms::PRIVATE) {
            'p'
        } else if self.contains(Perms::SHARED) {
            's'
        } else {
            '-'
        });
        write!(f, "{}", out)
    }
}
