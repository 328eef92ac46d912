use serde::{Deserialize, Serialize};

/// Game edition. Decides the widths and optional sections of the save layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Game {
    SkyrimLe,
    SkyrimSe,
    Fallout4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleWidth {
    U32,
    U64,
}

impl HandleWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            HandleWidth::U32 => 4,
            HandleWidth::U64 => 8,
        }
    }
}

impl Game {
    pub fn handle_width(self) -> HandleWidth {
        match self {
            Game::SkyrimLe => HandleWidth::U32,
            Game::SkyrimSe | Game::Fallout4 => HandleWidth::U64,
        }
    }

    /// Whether the plugin table may carry a lightweight-plugin block.
    pub fn supports_lite_plugins(self) -> bool {
        !matches!(self, Game::SkyrimLe)
    }

    /// Whether the VM knows struct values (and struct arrays).
    pub fn supports_structs(self) -> bool {
        matches!(self, Game::Fallout4)
    }
}

/// Width of an interned-string reference on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringIndexWidth {
    /// 2-byte indices, used by older saves.
    Short,
    #[default]
    Long,
}

impl StringIndexWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            StringIndexWidth::Short => 2,
            StringIndexWidth::Long => 4,
        }
    }
}

/// Everything a reader or writer needs to know about the byte layout of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub game: Game,
    pub string_index: StringIndexWidth,
    pub lite_plugins: bool,
}

impl Layout {
    pub fn new(game: Game, string_index: StringIndexWidth) -> Self {
        Self { game, string_index, lite_plugins: game.supports_lite_plugins() }
    }

    #[inline]
    pub fn handle_width(&self) -> HandleWidth {
        self.game.handle_width()
    }

    #[inline]
    pub fn handle_bytes(&self) -> usize {
        self.game.handle_width().bytes()
    }

    #[inline]
    pub fn string_index_bytes(&self) -> usize {
        self.string_index.bytes()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(Game::SkyrimSe, StringIndexWidth::Long)
    }
}
