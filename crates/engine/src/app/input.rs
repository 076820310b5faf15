#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PanUp,
    PanDown,
    PanLeft,
    PanRight,
    SwapSlot,
    SelectSlot1,
    SelectSlot2,
    Reload,
    ToggleDebug,
    Quit,
}

const ACTION_COUNT: usize = 14;

/// Held state plus a press edge per action. Edges are cleared by the
/// collector after each snapshot so a held key reports one press.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        let index = action.index();
        if is_down && !self.down[index] {
            self.pressed[index] = true;
        }
        self.down[index] = is_down;
    }

    pub(crate) fn set_pressed(&mut self, action: InputAction, pressed: bool) {
        self.pressed[action.index()] = pressed;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub(crate) fn clear_pressed(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::PanUp => 4,
            InputAction::PanDown => 5,
            InputAction::PanLeft => 6,
            InputAction::PanRight => 7,
            InputAction::SwapSlot => 8,
            InputAction::SelectSlot1 => 9,
            InputAction::SelectSlot2 => 10,
            InputAction::Reload => 11,
            InputAction::ToggleDebug => 12,
            InputAction::Quit => 13,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_fires_once_per_transition() {
        let mut states = ActionStates::default();
        states.set(InputAction::Reload, true);
        assert!(states.was_pressed(InputAction::Reload));

        states.clear_pressed();
        states.set(InputAction::Reload, true);
        assert!(states.is_down(InputAction::Reload));
        assert!(!states.was_pressed(InputAction::Reload));

        states.set(InputAction::Reload, false);
        states.set(InputAction::Reload, true);
        assert!(states.was_pressed(InputAction::Reload));
    }
}
