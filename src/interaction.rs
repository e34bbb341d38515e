//! Selection and tooltip state machine for one map surface.
//!
//! Every click and camera notification goes through `InteractionController`;
//! it returns the events the host should apply to its tooltip UI.

/// What the user has explicitly selected
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    None,
    MarkerSelected(u64),
    ClusterSelected(Vec<u64>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TooltipStyle {
    /// Pinned to the selected marker
    Selected,
    /// Low-emphasis tooltip following the entity nearest the center
    Focus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    TooltipShown { entity_id: u64, style: TooltipStyle },
    TooltipHidden,
    FocusChanged(Option<u64>),
    SelectionChanged(SelectionState),
}

#[derive(Debug, Default)]
pub struct InteractionController {
    state: SelectionState,
    /// Entity the focus tracker last settled on, shown or not
    focus: Option<u64>,
    /// Whether a focus tooltip is currently visible
    focus_visible: bool,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn focus(&self) -> Option<u64> {
        self.focus
    }

    pub fn selected_marker(&self) -> Option<u64> {
        match self.state {
            SelectionState::MarkerSelected(id) => Some(id),
            _ => None,
        }
    }

    /// The emphasized tooltip: the selected marker's, else the focus one
    pub fn tooltip(&self) -> Option<(u64, TooltipStyle)> {
        match self.state {
            SelectionState::MarkerSelected(id) => Some((id, TooltipStyle::Selected)),
            _ => self.focus_tooltip(),
        }
    }

    /// Focus tooltip, visible beside a selected marker unless it is that marker
    pub fn focus_tooltip(&self) -> Option<(u64, TooltipStyle)> {
        match (self.focus_visible, self.focus) {
            (true, Some(id)) if self.selected_marker() != Some(id) => Some((id, TooltipStyle::Focus)),
            _ => None,
        }
    }

    fn any_tooltip(&self) -> bool {
        self.selected_marker().is_some() || self.focus_tooltip().is_some()
    }

    fn set_state(&mut self, state: SelectionState, events: &mut Vec<InteractionEvent>) {
        self.state = state;
        events.push(InteractionEvent::SelectionChanged(self.state.clone()));
    }

    fn hide_focus(&mut self, events: &mut Vec<InteractionEvent>) {
        if self.focus_visible {
            self.focus_visible = false;
            events.push(InteractionEvent::TooltipHidden);
        }
    }

    pub fn click_marker(&mut self, entity_id: u64) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        match self.state {
            SelectionState::MarkerSelected(current) if current == entity_id => {
                self.set_state(SelectionState::None, &mut events);
                events.push(InteractionEvent::TooltipHidden);
            }
            _ => {
                let had_tooltip = self.any_tooltip();
                self.focus_visible = false;
                if had_tooltip {
                    events.push(InteractionEvent::TooltipHidden);
                }
                self.set_state(SelectionState::MarkerSelected(entity_id), &mut events);
                events.push(InteractionEvent::TooltipShown {
                    entity_id,
                    style: TooltipStyle::Selected,
                });
            }
        }
        events
    }

    pub fn click_cluster(&mut self, member_ids: Vec<u64>) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        let had_tooltip = self.any_tooltip();
        self.focus_visible = false;
        self.set_state(SelectionState::ClusterSelected(member_ids), &mut events);
        if had_tooltip {
            events.push(InteractionEvent::TooltipHidden);
        }
        events
    }

    pub fn click_background(&mut self) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        match self.state {
            SelectionState::None => {}
            SelectionState::MarkerSelected(_) => {
                self.set_state(SelectionState::None, &mut events);
                events.push(InteractionEvent::TooltipHidden);
            }
            SelectionState::ClusterSelected(_) => {
                self.set_state(SelectionState::None, &mut events);
            }
        }
        events
    }

    /// Camera moved; `nearest` is the entity now closest to the view center
    pub fn camera_changed(&mut self, nearest: Option<u64>) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        let selected = match &self.state {
            SelectionState::ClusterSelected(_) => {
                self.hide_focus(&mut events);
                return events;
            }
            SelectionState::MarkerSelected(id) => Some(*id),
            SelectionState::None => None,
        };

        if nearest != self.focus {
            self.focus = nearest;
            events.push(InteractionEvent::FocusChanged(nearest));
        }

        match (self.focus, selected) {
            (None, _) => self.hide_focus(&mut events),
            // Never double up on the selected marker
            (Some(id), Some(sel)) if id == sel => self.hide_focus(&mut events),
            (Some(id), _) => {
                if !self.focus_visible || events.iter().any(|e| matches!(e, InteractionEvent::FocusChanged(_))) {
                    self.focus_visible = true;
                    events.push(InteractionEvent::TooltipShown {
                        entity_id: id,
                        style: TooltipStyle::Focus,
                    });
                }
            }
        }
        events
    }

    /// Forget everything (snapshot replaced or surface reset)
    pub fn reset(&mut self) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        if self.any_tooltip() {
            events.push(InteractionEvent::TooltipHidden);
        }
        if self.state != SelectionState::None {
            self.set_state(SelectionState::None, &mut events);
        }
        self.focus = None;
        self.focus_visible = false;
        events
    }
}
