use std::fmt;
use std::hash::{Hash, Hasher};

use crate::config::{HandleWidth, Layout};
use crate::error::FormatError;
use crate::io::{Element, SaveReader, SaveWriter};

/// Opaque VM object id (thread, instance, array, struct).
///
/// The width follows the game edition; equality and hashing use the raw value only.
#[derive(Clone, Copy)]
pub struct Handle {
    raw: u64,
    width: HandleWidth,
}

impl Handle {
    pub fn new(raw: u64, width: HandleWidth) -> Self {
        let raw = match width {
            HandleWidth::U32 => raw & 0xFFFF_FFFF,
            HandleWidth::U64 => raw,
        };
        Self { raw, width }
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.raw
    }

    #[inline]
    pub fn width(&self) -> HandleWidth {
        self.width
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn read(r: &mut SaveReader<'_>) -> Result<Self, FormatError> {
        let width = r.layout().handle_width();
        let raw = match width {
            HandleWidth::U32 => r.read_u32()? as u64,
            HandleWidth::U64 => r.read_u64()?,
        };
        Ok(Self { raw, width })
    }
}

impl Element for Handle {
    fn write(&self, w: &mut SaveWriter) {
        match self.width {
            HandleWidth::U32 => w.write_u32(self.raw as u32),
            HandleWidth::U64 => w.write_u64(self.raw),
        }
    }

    fn calculate_size(&self, _layout: &Layout) -> usize {
        self.width.bytes()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Handle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Handle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.width {
            HandleWidth::U32 => write!(f, "{:08x}", self.raw),
            HandleWidth::U64 => write!(f, "{:016x}", self.raw),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Game, StringIndexWidth};
    use crate::io::to_bytes;

    #[test]
    fn width_follows_edition() {
        let le = Layout::new(Game::SkyrimLe, StringIndexWidth::Short);
        let se = Layout::new(Game::SkyrimSe, StringIndexWidth::Long);
        let bytes = hex::decode("7856341200000000").unwrap();

        let mut r = SaveReader::new(&bytes, le);
        let narrow = Handle::read(&mut r).unwrap();
        assert_eq!(r.remaining(), 4);
        assert_eq!(to_bytes(&narrow, le).unwrap(), &bytes[..4]);

        let mut r = SaveReader::new(&bytes, se);
        let wide = Handle::read(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(to_bytes(&wide, se).unwrap(), bytes);

        assert_eq!(narrow, wide);
        assert_eq!(wide.to_string(), "0000000012345678");
    }
}
