//! Named callback slots of an application.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Number of callback slots.
pub const SLOT_COUNT: usize = 11;

/// A script-settable application callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ApplicationSlot {
    Key = 0,
    Input = 1,
    Wheel = 2,
    Window = 3,
    Dispatch = 4,
    Publish = 5,
    Composition = 6,
    ScriptHook = 7,
    Initialize = 8,
    Startup = 9,
    Shutdown = 10,
}

impl ApplicationSlot {
    pub const ALL: [ApplicationSlot; SLOT_COUNT] = [
        ApplicationSlot::Key,
        ApplicationSlot::Input,
        ApplicationSlot::Wheel,
        ApplicationSlot::Window,
        ApplicationSlot::Dispatch,
        ApplicationSlot::Publish,
        ApplicationSlot::Composition,
        ApplicationSlot::ScriptHook,
        ApplicationSlot::Initialize,
        ApplicationSlot::Startup,
        ApplicationSlot::Shutdown,
    ];

    pub fn index(self) -> usize {
        usize::from(u8::from(self))
    }

    /// Name of the script property setting this slot.
    pub fn property_name(self) -> &'static str {
        match self {
            ApplicationSlot::Key => "on_key_event",
            ApplicationSlot::Input => "on_input_event",
            ApplicationSlot::Wheel => "on_wheel_event",
            ApplicationSlot::Window => "on_window_event",
            ApplicationSlot::Dispatch => "on_dispatch",
            ApplicationSlot::Publish => "on_publish",
            ApplicationSlot::Composition => "on_composition",
            ApplicationSlot::ScriptHook => "on_script_hook",
            ApplicationSlot::Initialize => "on_initialize",
            ApplicationSlot::Startup => "on_startup",
            ApplicationSlot::Shutdown => "on_shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense() {
        for (position, slot) in ApplicationSlot::ALL.into_iter().enumerate() {
            assert_eq!(slot.index(), position);
            assert_eq!(ApplicationSlot::try_from(position as u8), Ok(slot));
        }
        assert!(ApplicationSlot::try_from(SLOT_COUNT as u8).is_err());
    }
}
