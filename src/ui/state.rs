//! Interaction state bits and the alignment/clamp byte

use bitflags::bitflags;

bitflags! {
    /// Per-widget interaction flags.
    ///
    /// A widget's `state` holds the flags it claimed itself; `childstate` is
    /// the OR of everything claimed below it.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StateFlags: u32 {
        const HOVER = 1 << 0;
        const PRESS = 1 << 1;
        const HOLD = 1 << 2;
        const RELEASE = 1 << 3;
        const ALT_PRESS = 1 << 4;
        const ALT_HOLD = 1 << 5;
        const ALT_RELEASE = 1 << 6;
        const ESC_PRESS = 1 << 7;
        const ESC_HOLD = 1 << 8;
        const ESC_RELEASE = 1 << 9;
        const SCROLL_UP = 1 << 10;
        const SCROLL_DOWN = 1 << 11;
        const HIDDEN = 1 << 12;

        const HOLD_MASK = Self::HOLD.bits() | Self::ALT_HOLD.bits() | Self::ESC_HOLD.bits();
    }
}

impl StateFlags {
    /// The twelve propagated flags, in dispatch order
    pub const PROPAGATED: [StateFlags; 12] = [
        StateFlags::HOVER,
        StateFlags::PRESS,
        StateFlags::HOLD,
        StateFlags::RELEASE,
        StateFlags::ALT_HOLD,
        StateFlags::ALT_PRESS,
        StateFlags::ALT_RELEASE,
        StateFlags::ESC_HOLD,
        StateFlags::ESC_PRESS,
        StateFlags::ESC_RELEASE,
        StateFlags::SCROLL_UP,
        StateFlags::SCROLL_DOWN,
    ];

    /// Script-facing name (`hover`, `press`, `althold`, ...)
    pub fn name(self) -> &'static str {
        match self {
            f if f == StateFlags::HOVER => "hover",
            f if f == StateFlags::PRESS => "press",
            f if f == StateFlags::HOLD => "hold",
            f if f == StateFlags::RELEASE => "release",
            f if f == StateFlags::ALT_PRESS => "altpress",
            f if f == StateFlags::ALT_HOLD => "althold",
            f if f == StateFlags::ALT_RELEASE => "altrelease",
            f if f == StateFlags::ESC_PRESS => "escpress",
            f if f == StateFlags::ESC_HOLD => "eschold",
            f if f == StateFlags::ESC_RELEASE => "escrelease",
            f if f == StateFlags::SCROLL_UP => "scrollup",
            f if f == StateFlags::SCROLL_DOWN => "scrolldown",
            f if f == StateFlags::HIDDEN => "hidden",
            _ => "",
        }
    }

    pub fn from_script_name(name: &str) -> Option<StateFlags> {
        StateFlags::PROPAGATED.into_iter().find(|f| f.name() == name)
    }
}

const ALIGN_HSHIFT: u8 = 0;
const ALIGN_VSHIFT: u8 = 2;

bitflags! {
    /// Alignment nibble plus edge clamps.
    ///
    /// The low two bits pick the horizontal alignment (0 = none), the next
    /// two the vertical one. A clamped edge sticks to the parent's edge and
    /// absorbs the alignment offset into the widget's own size.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Adjust: u8 {
        const LEFT = 1 << ALIGN_HSHIFT;
        const HCENTER = 2 << ALIGN_HSHIFT;
        const RIGHT = 3 << ALIGN_HSHIFT;
        const HMASK = 3 << ALIGN_HSHIFT;

        const TOP = 1 << ALIGN_VSHIFT;
        const VCENTER = 2 << ALIGN_VSHIFT;
        const BOTTOM = 3 << ALIGN_VSHIFT;
        const VMASK = 3 << ALIGN_VSHIFT;

        const ALIGN_MASK = Self::HMASK.bits() | Self::VMASK.bits();

        const CLAMP_LEFT = 0x10;
        const CLAMP_RIGHT = 0x20;
        const CLAMP_TOP = 0x40;
        const CLAMP_BOTTOM = 0x80;
        const CLAMP_MASK = 0xF0;

        const CENTER = Self::HCENTER.bits() | Self::VCENTER.bits();
    }
}

impl Adjust {
    /// Horizontal alignment bits only
    pub fn horizontal(self) -> Adjust {
        self & Adjust::HMASK
    }

    /// Vertical alignment bits only
    pub fn vertical(self) -> Adjust {
        self & Adjust::VMASK
    }

    /// Script alignment: -2 none, -1 left/top, 0 center, 1 right/bottom
    pub fn set_align(&mut self, xalign: i32, yalign: i32) {
        let h = ((xalign.clamp(-2, 1) + 2) as u8) << ALIGN_HSHIFT;
        let v = ((yalign.clamp(-2, 1) + 2) as u8) << ALIGN_VSHIFT;
        *self = (*self - Adjust::ALIGN_MASK) | Adjust::from_bits_retain(h | v);
    }

    pub fn set_clamp(&mut self, left: bool, right: bool, top: bool, bottom: bool) {
        self.remove(Adjust::CLAMP_MASK);
        self.set(Adjust::CLAMP_LEFT, left);
        self.set(Adjust::CLAMP_RIGHT, right);
        self.set(Adjust::CLAMP_TOP, top);
        self.set(Adjust::CLAMP_BOTTOM, bottom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_align_encoding() {
        let mut adjust = Adjust::CENTER;
        adjust.set_align(-1, 1);
        assert_eq!(adjust.horizontal(), Adjust::LEFT);
        assert_eq!(adjust.vertical(), Adjust::BOTTOM);

        // Out of range values clamp, -2 means none
        adjust.set_align(5, -7);
        assert_eq!(adjust.horizontal(), Adjust::RIGHT);
        assert_eq!(adjust.vertical(), Adjust::empty());
    }

    #[test]
    fn test_set_align_keeps_clamps() {
        let mut adjust = Adjust::CLAMP_LEFT | Adjust::CENTER;
        adjust.set_align(0, -1);
        assert!(adjust.contains(Adjust::CLAMP_LEFT));
        assert_eq!(adjust.vertical(), Adjust::TOP);

        adjust.set_clamp(false, true, false, true);
        assert!(!adjust.contains(Adjust::CLAMP_LEFT));
        assert!(adjust.contains(Adjust::CLAMP_RIGHT | Adjust::CLAMP_BOTTOM));
        assert_eq!(adjust.horizontal(), Adjust::HCENTER);
    }

    #[test]
    fn test_state_names_round_trip() {
        for flag in StateFlags::PROPAGATED {
            assert_eq!(StateFlags::from_script_name(flag.name()), Some(flag));
        }
        assert_eq!(StateFlags::HOLD_MASK.bits(), 0b1_0010_0100);
    }
}
