/// PS/2 set-1 scancode translation with shift and caps-lock state.
///
/// A keycode is 16 bits: the translated key in the low byte, flag bits above
/// it. Special keys (function, modifier, keypad) carry `SPECIAL_FLAG`; keypad
/// keys also carry `KEYPAD_FLAG`. Modifier bits live in the top nibble.
///
/// Ordinary keys surface on *release*, not on press, so a held key that
/// auto-repeats press codes never produces duplicate characters.
use bitflags::bitflags;
use static_assertions::const_assert_eq;

bitflags! {
    /// Modifier latch state, stored in the same bit positions it occupies
    /// in a keycode.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u16 {
        const SHIFT = 0x1000;
        const CAPS  = 0x8000;
    }
}

pub const SPECIAL_FLAG: u16 = 0x0100;
pub const KEYPAD_FLAG: u16 = 0x0200;

/// Release bit of a raw scancode.
const RELEASE_BIT: u8 = 0x80;

const ASCII_ESC: u16 = 0x1B;
const ASCII_BS: u16 = 0x08;

const fn special(n: u16) -> u16 {
    SPECIAL_FLAG | n
}

const KEYPAD_START: u16 = 128;

const fn keypad(n: u16) -> u16 {
    KEYPAD_FLAG | SPECIAL_FLAG | (n + KEYPAD_START)
}

pub const KEY_UNKNOWN: u16 = special(0);
pub const KEY_F1: u16 = special(1);
pub const KEY_F9: u16 = special(9);
pub const KEY_F10: u16 = special(10);
pub const KEY_LCTRL: u16 = special(13);
pub const KEY_LSHIFT: u16 = special(15);
pub const KEY_RSHIFT: u16 = special(16);
pub const KEY_LALT: u16 = special(17);
pub const KEY_PRINTSCRN: u16 = special(19);
pub const KEY_CAPSLOCK: u16 = special(20);
pub const KEY_NUMLOCK: u16 = special(21);
pub const KEY_SCRLOCK: u16 = special(22);
pub const KEY_SYSREQ: u16 = special(23);

/// Keypad keys 0x47..=0x53 in scancode order (home, up, pgup, minus, left,
/// center, right, plus, end, down, pgdn, insert, del).
pub const KEY_KPHOME: u16 = keypad(0);
pub const KEY_KPDEL: u16 = keypad(12);

/// Entries per translation table; scancodes at or above this are unknown.
pub const TABLE_LEN: usize = 0x58;

/// A translated key, or `KeyCode::NONE` when the event produced nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct KeyCode(u16);

impl KeyCode {
    pub const NONE: KeyCode = KeyCode(0xFFFF);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Function, modifier, keypad and unknown keys.
    pub fn is_special(self) -> bool {
        !self.is_none() && self.0 & SPECIAL_FLAG != 0
    }

    /// The key with the modifier bits stripped.
    pub fn key(self) -> u16 {
        self.0 & !Modifiers::all().bits()
    }

    /// Low-order character byte.
    pub fn char_byte(self) -> u8 {
        self.0 as u8
    }

    pub fn modifiers(self) -> Modifiers {
        if self.is_none() {
            Modifiers::empty()
        } else {
            Modifiers::from_bits_truncate(self.0)
        }
    }
}

/// Build one translation table. Only the four alphanumeric rows differ
/// between the shift/caps combinations; the rest of the layout is shared.
const fn build_table(digits: &[u8; 12], top: &[u8; 12], home: &[u8; 12], bottom: &[u8; 11]) -> [u16; TABLE_LEN] {
    let mut t = [KEY_UNKNOWN; TABLE_LEN];
    t[0x01] = ASCII_ESC;
    t[0x0E] = ASCII_BS;
    t[0x0F] = b'\t' as u16;
    t[0x1C] = b'\r' as u16;
    t[0x1D] = KEY_LCTRL;
    t[0x2A] = KEY_LSHIFT;
    t[0x36] = KEY_RSHIFT;
    t[0x37] = KEY_PRINTSCRN;
    t[0x38] = KEY_LALT;
    t[0x39] = b' ' as u16;
    t[0x3A] = KEY_CAPSLOCK;
    t[0x45] = KEY_NUMLOCK;
    t[0x46] = KEY_SCRLOCK;
    t[0x54] = KEY_SYSREQ;

    let mut i = 0;
    while i < 10 {
        t[0x3B + i] = KEY_F1 + i as u16;
        i += 1;
    }
    i = 0;
    while i < 13 {
        t[0x47 + i] = keypad(i as u16);
        i += 1;
    }
    i = 0;
    while i < 12 {
        t[0x02 + i] = digits[i] as u16;
        t[0x10 + i] = top[i] as u16;
        t[0x1E + i] = home[i] as u16;
        i += 1;
    }
    i = 0;
    while i < 11 {
        t[0x2B + i] = bottom[i] as u16;
        i += 1;
    }
    t
}

static NO_SHIFT_NO_CAPS: [u16; TABLE_LEN] =
    build_table(b"1234567890-=", b"qwertyuiop[]", b"asdfghjkl;'`", b"\\zxcvbnm,./");
static SHIFT_NO_CAPS: [u16; TABLE_LEN] =
    build_table(b"!@#$%^&*()_+", b"QWERTYUIOP{}", b"ASDFGHJKL:\"~", b"|ZXCVBNM<>?");
static NO_SHIFT_CAPS: [u16; TABLE_LEN] =
    build_table(b"1234567890-=", b"QWERTYUIOP[]", b"ASDFGHJKL;'`", b"\\ZXCVBNM,./");
static SHIFT_CAPS: [u16; TABLE_LEN] =
    build_table(b"!@#$%^&*()_+", b"qwertyuiop{}", b"asdfghjkl:\"~", b"|zxcvbnm<>?");

const_assert_eq!(KEY_KPDEL, KEYPAD_FLAG | SPECIAL_FLAG | 140);
const_assert_eq!(KEY_F10 - KEY_F1, 9);

/// Table selected by the current modifier state.
pub fn table_for(mods: Modifiers) -> &'static [u16; TABLE_LEN] {
    match (mods.contains(Modifiers::CAPS), mods.contains(Modifiers::SHIFT)) {
        (false, false) => &NO_SHIFT_NO_CAPS,
        (false, true) => &SHIFT_NO_CAPS,
        (true, false) => &NO_SHIFT_CAPS,
        (true, true) => &SHIFT_CAPS,
    }
}

/// Table lookup for a base (release bit stripped) scancode.
pub fn lookup(mods: Modifiers, code: u8) -> u16 {
    table_for(mods)
        .get(code as usize)
        .copied()
        .unwrap_or(KEY_UNKNOWN)
}

/// One translation step: `(scancode, state) -> (keycode, new state)`.
pub fn step(mods: Modifiers, scancode: u8) -> (KeyCode, Modifiers) {
    let release = scancode & RELEASE_BIT != 0;
    let key = lookup(mods, scancode & !RELEASE_BIT);

    match key {
        KEY_LSHIFT | KEY_RSHIFT => {
            let mut next = mods;
            next.set(Modifiers::SHIFT, !release);
            (KeyCode::NONE, next)
        }
        KEY_CAPSLOCK => {
            // Latch: toggles on press, release is ignored.
            let mut next = mods;
            if !release {
                next.toggle(Modifiers::CAPS);
            }
            (KeyCode::NONE, next)
        }
        _ if release => (KeyCode(mods.bits() | key), mods),
        _ => (KeyCode::NONE, mods),
    }
}

/// Stateful translator holding the modifier latch for one session.
pub struct Translator {
    mods: Modifiers,
}

impl Translator {
    pub const fn new() -> Self {
        Self {
            mods: Modifiers::empty(),
        }
    }

    /// Forget any held shift or latched caps-lock.
    pub fn reset(&mut self) {
        self.mods = Modifiers::empty();
    }

    pub fn modifiers(&self) -> Modifiers {
        self.mods
    }

    /// Feed one raw scancode. Never fails: unmapped codes translate to
    /// `KEY_UNKNOWN`.
    pub fn translate(&mut self, scancode: u8) -> KeyCode {
        let (key, next) = step(self.mods, scancode);
        self.mods = next;
        key
    }
}
