/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Keyboard commands for the topology view.
//!
//! Key capture happens elsewhere; this module receives already-captured
//! events and turns them into intents. Collection (`collect_actions`) is
//! separated from intent mapping (`intents_from_actions`) so both halves are
//! testable without an engine.
//!
//! Character shortcuts fire on key down and are suppressed while the search
//! field is focused or a raw-pipe terminal is open. Escape, Enter and
//! Backspace fire on key up regardless of focus.

use keyboard_types::{Code, Key, KeyState, Modifiers, NamedKey};

use crate::app::{CycleDirection, EngineIntent, EngineState};

/// One captured key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInputEvent {
    pub state: KeyState,
    pub key: Key,
    pub code: Code,
    pub modifiers: Modifiers,
    pub repeat: bool,
}

impl RawInputEvent {
    pub fn key_down(key: Key, code: Code) -> Self {
        Self {
            state: KeyState::Down,
            key,
            code,
            modifiers: Modifiers::empty(),
            repeat: false,
        }
    }

    pub fn key_up(key: Key, code: Code) -> Self {
        Self {
            state: KeyState::Up,
            ..Self::key_down(key, code)
        }
    }

    /// Key down for a printable character, as produced by a layout-aware
    /// capture layer.
    pub fn character(text: &str) -> Self {
        Self::key_down(Key::Character(text.to_string()), Code::Unidentified)
    }

    pub fn named_down(named: NamedKey, code: Code) -> Self {
        Self::key_down(Key::Named(named), code)
    }

    pub fn named_up(named: NamedKey, code: Code) -> Self {
        Self::key_up(Key::Named(named), code)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    fn is_alt(&self) -> bool {
        matches!(self.key, Key::Named(NamedKey::Alt))
            || matches!(self.code, Code::AltLeft | Code::AltRight)
    }
}

/// Focus context the gate is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFocus {
    pub search_focused: bool,
    pub raw_pipe_open: bool,
}

impl InputFocus {
    pub fn from_state(state: &EngineState) -> Self {
        Self {
            search_focused: state.search_focused,
            raw_pipe_open: state.raw_pipe_open(),
        }
    }

    pub fn blocks_shortcuts(self) -> bool {
        self.search_focused || self.raw_pipe_open
    }
}

/// Keyboard actions collected from one event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyboardActions {
    pub cycle_metric_backward: bool,
    pub cycle_metric_forward: bool,
    pub toggle_grid_mode: bool,
    pub unpin_metric: bool,
    pub focus_search: bool,
    pub toggle_help: bool,
    pub hit_esc: bool,
    pub hit_enter: bool,
    pub hit_backspace: bool,
    pub toggle_diagnostics_panel: bool,
    /// `Some` only on a physical Alt transition.
    pub option_key: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub intents: Vec<EngineIntent>,
    /// The capture layer should suppress the event's default action.
    pub prevent_default: bool,
}

/// Stateful part of the dispatcher: tracks the physical Alt key so that key
/// repeat never produces duplicate transitions.
#[derive(Debug, Default, Clone)]
pub struct CommandDispatcher {
    option_key_down: bool,
}

impl CommandDispatcher {
    pub fn option_key_down(&self) -> bool {
        self.option_key_down
    }

    pub fn dispatch(&mut self, event: &RawInputEvent, focus: InputFocus) -> DispatchOutcome {
        let actions = self.collect_actions(event, focus);
        DispatchOutcome {
            prevent_default: actions.focus_search,
            intents: intents_from_actions(&actions),
        }
    }

    pub fn collect_actions(&mut self, event: &RawInputEvent, focus: InputFocus) -> KeyboardActions {
        let mut actions = KeyboardActions::default();

        if event.is_alt() {
            let down = event.state == KeyState::Down;
            if down != self.option_key_down {
                self.option_key_down = down;
                actions.option_key = Some(down);
            }
            return actions;
        }

        match event.state {
            KeyState::Up => {
                match &event.key {
                    Key::Named(NamedKey::Escape) => actions.hit_esc = true,
                    Key::Named(NamedKey::Enter) => actions.hit_enter = true,
                    Key::Named(NamedKey::Backspace) => actions.hit_backspace = true,
                    _ => {},
                }
                // Ctrl+D: diagnostics panel, unless the terminal owns the keyboard.
                if event.code == Code::KeyD
                    && event.modifiers.contains(Modifiers::CONTROL)
                    && !focus.raw_pipe_open
                {
                    actions.toggle_diagnostics_panel = true;
                }
            },
            KeyState::Down => {
                if focus.blocks_shortcuts()
                    || event
                        .modifiers
                        .intersects(Modifiers::CONTROL | Modifiers::META)
                {
                    return actions;
                }
                let Key::Character(text) = &event.key else {
                    return actions;
                };
                match text.as_str() {
                    "<" => actions.cycle_metric_backward = true,
                    ">" => actions.cycle_metric_forward = true,
                    "t" | "g" => actions.toggle_grid_mode = true,
                    "q" => actions.unpin_metric = true,
                    "/" => actions.focus_search = true,
                    "?" => actions.toggle_help = true,
                    _ => {},
                }
            },
        }
        actions
    }
}

/// Convert collected actions into intents, in a fixed order.
pub fn intents_from_actions(actions: &KeyboardActions) -> Vec<EngineIntent> {
    let mut intents = Vec::new();
    if let Some(down) = actions.option_key {
        intents.push(EngineIntent::SetOptionKeyDown { down });
    }
    if actions.hit_esc {
        intents.push(EngineIntent::HitEsc);
    }
    if actions.hit_enter {
        intents.push(EngineIntent::HitEnter);
    }
    if actions.hit_backspace {
        intents.push(EngineIntent::HitBackspace);
    }
    if actions.toggle_diagnostics_panel {
        intents.push(EngineIntent::ToggleDiagnosticsPanel);
    }
    if actions.cycle_metric_backward {
        intents.push(EngineIntent::PinNextMetric {
            direction: CycleDirection::Backward,
        });
    }
    if actions.cycle_metric_forward {
        intents.push(EngineIntent::PinNextMetric {
            direction: CycleDirection::Forward,
        });
    }
    if actions.toggle_grid_mode {
        intents.push(EngineIntent::ToggleGridMode);
    }
    if actions.unpin_metric {
        intents.push(EngineIntent::UnpinMetric);
        intents.push(EngineIntent::SelectMetric { metric: None });
    }
    if actions.focus_search {
        intents.push(EngineIntent::FocusSearch);
    }
    if actions.toggle_help {
        intents.push(EngineIntent::ToggleHelp);
    }
    intents
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::app::{ViewEngine, ViewMode};

    const UNFOCUSED: InputFocus = InputFocus {
        search_focused: false,
        raw_pipe_open: false,
    };
    const SEARCHING: InputFocus = InputFocus {
        search_focused: true,
        raw_pipe_open: false,
    };
    const TERMINAL: InputFocus = InputFocus {
        search_focused: false,
        raw_pipe_open: true,
    };

    fn dispatch(event: RawInputEvent, focus: InputFocus) -> DispatchOutcome {
        CommandDispatcher::default().dispatch(&event, focus)
    }

    #[rstest]
    #[case("<", vec![EngineIntent::PinNextMetric { direction: CycleDirection::Backward }])]
    #[case(">", vec![EngineIntent::PinNextMetric { direction: CycleDirection::Forward }])]
    #[case("t", vec![EngineIntent::ToggleGridMode])]
    #[case("g", vec![EngineIntent::ToggleGridMode])]
    #[case("q", vec![EngineIntent::UnpinMetric, EngineIntent::SelectMetric { metric: None }])]
    #[case("/", vec![EngineIntent::FocusSearch])]
    #[case("?", vec![EngineIntent::ToggleHelp])]
    #[case("x", vec![])]
    fn character_shortcuts_when_unfocused(#[case] text: &str, #[case] expected: Vec<EngineIntent>) {
        assert_eq!(dispatch(RawInputEvent::character(text), UNFOCUSED).intents, expected);
    }

    #[rstest]
    fn character_shortcuts_are_gated(
        #[values("<", ">", "t", "g", "q", "/", "?")] text: &str,
        #[values(SEARCHING, TERMINAL)] focus: InputFocus,
    ) {
        let outcome = dispatch(RawInputEvent::character(text), focus);
        assert!(outcome.intents.is_empty());
        assert!(!outcome.prevent_default);
    }

    #[test]
    fn slash_suppresses_default_action() {
        assert!(dispatch(RawInputEvent::character("/"), UNFOCUSED).prevent_default);
        assert!(!dispatch(RawInputEvent::character("?"), UNFOCUSED).prevent_default);
    }

    #[test]
    fn control_modified_characters_are_not_shortcuts() {
        let event = RawInputEvent::character("g").with_modifiers(Modifiers::CONTROL);
        assert!(dispatch(event, UNFOCUSED).intents.is_empty());
    }

    #[rstest]
    #[case(NamedKey::Escape, Code::Escape, EngineIntent::HitEsc)]
    #[case(NamedKey::Enter, Code::Enter, EngineIntent::HitEnter)]
    #[case(NamedKey::Backspace, Code::Backspace, EngineIntent::HitBackspace)]
    fn control_keys_fire_on_release_regardless_of_focus(
        #[case] named: NamedKey,
        #[case] code: Code,
        #[case] expected: EngineIntent,
        #[values(UNFOCUSED, SEARCHING, TERMINAL)] focus: InputFocus,
    ) {
        assert!(dispatch(RawInputEvent::named_down(named.clone(), code), focus).intents.is_empty());
        assert_eq!(
            dispatch(RawInputEvent::named_up(named, code), focus).intents,
            vec![expected]
        );
    }

    #[rstest]
    #[case(UNFOCUSED, true)]
    #[case(SEARCHING, true)]
    #[case(TERMINAL, false)]
    fn ctrl_d_release_toggles_diagnostics(#[case] focus: InputFocus, #[case] fires: bool) {
        let event = RawInputEvent::key_up(Key::Character("d".into()), Code::KeyD)
            .with_modifiers(Modifiers::CONTROL);
        let intents = dispatch(event, focus).intents;
        assert_eq!(intents.contains(&EngineIntent::ToggleDiagnosticsPanel), fires);
    }

    #[test]
    fn alt_tracks_physical_state_through_repeat() {
        let mut dispatcher = CommandDispatcher::default();
        let down = RawInputEvent::named_down(NamedKey::Alt, Code::AltLeft);

        assert_eq!(
            dispatcher.dispatch(&down, UNFOCUSED).intents,
            vec![EngineIntent::SetOptionKeyDown { down: true }]
        );
        assert!(dispatcher.dispatch(&down.clone().repeating(), UNFOCUSED).intents.is_empty());
        assert!(dispatcher.dispatch(&down, SEARCHING).intents.is_empty());
        assert!(dispatcher.option_key_down());

        let up = RawInputEvent::named_up(NamedKey::Alt, Code::AltLeft);
        assert_eq!(
            dispatcher.dispatch(&up, SEARCHING).intents,
            vec![EngineIntent::SetOptionKeyDown { down: false }]
        );
        assert!(dispatcher.dispatch(&up, UNFOCUSED).intents.is_empty());
    }

    #[test]
    fn grid_toggle_respects_search_focus_end_to_end() {
        let mut engine = ViewEngine::new_for_testing();
        engine.apply_intents([EngineIntent::FocusSearch]);
        engine.handle_input(&RawInputEvent::character("g"));
        assert_eq!(engine.state().view_mode, ViewMode::Graph);

        engine.handle_input(&RawInputEvent::named_up(NamedKey::Escape, Code::Escape));
        assert!(!engine.state().search_focused);
        engine.handle_input(&RawInputEvent::character("g"));
        assert_eq!(engine.state().view_mode, ViewMode::Table);
    }

    #[test]
    fn slash_then_enter_pins_typed_query() {
        let mut engine = ViewEngine::new_for_testing();
        let outcome = engine.handle_input(&RawInputEvent::character("/"));
        assert!(outcome.prevent_default);
        assert!(engine.state().search_focused);

        engine.apply_intents([EngineIntent::SetSearchQuery {
            query: "weave".into(),
        }]);
        // Typing into the field must not trigger shortcuts.
        engine.handle_input(&RawInputEvent::character("q"));
        engine.handle_input(&RawInputEvent::named_up(NamedKey::Enter, Code::Enter));
        assert_eq!(engine.state().pinned_searches, vec!["weave".to_string()]);
    }
}
