use serde::Serialize;

use crate::perception::templates::TemplateKind;

/// Recognisable UI states of the automated workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    Green,
    Captcha,
    Pin,
    Glo,
    Glo2,
    Confirm,
}

impl UiState {
    pub fn label(self) -> &'static str {
        match self {
            UiState::Green => "green",
            UiState::Captcha => "captcha",
            UiState::Pin => "pin",
            UiState::Glo => "glo",
            UiState::Glo2 => "glo2",
            UiState::Confirm => "confirm",
        }
    }
}

/// One step of the per-iteration check ladder.
#[derive(Debug, Clone, Copy)]
pub struct Rung {
    pub state: UiState,
    pub templates: TemplateKind,
    /// Skip the remaining rungs this iteration once this one matches.
    pub short_circuit: bool,
}

/// Evaluated top to bottom against each fresh frame.
pub const LADDER: [Rung; 6] = [
    Rung { state: UiState::Green, templates: TemplateKind::Green, short_circuit: false },
    Rung { state: UiState::Captcha, templates: TemplateKind::StartPoint, short_circuit: true },
    Rung { state: UiState::Pin, templates: TemplateKind::Pin, short_circuit: true },
    Rung { state: UiState::Glo, templates: TemplateKind::Glo, short_circuit: false },
    Rung { state: UiState::Glo2, templates: TemplateKind::Glo2, short_circuit: false },
    Rung { state: UiState::Confirm, templates: TemplateKind::Confirm, short_circuit: false },
];

/// Outcome of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Every rung was evaluated; carries the states that matched.
    Completed(Vec<UiState>),
    /// A short-circuit rung matched and the rest were skipped.
    ShortCircuited(UiState),
    /// Stop or pause was requested mid-iteration.
    Interrupted,
}

/// Agent status for display.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub title: String,
    pub index: usize,
    pub running: bool,
    pub paused: bool,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub captcha_attempts: u32,
    pub captcha_solved: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_order_is_fixed() {
        let order: Vec<_> = LADDER.iter().map(|r| r.state).collect();
        assert_eq!(
            order,
            vec![UiState::Green, UiState::Captcha, UiState::Pin, UiState::Glo, UiState::Glo2, UiState::Confirm]
        );
        let short: Vec<_> = LADDER.iter().filter(|r| r.short_circuit).map(|r| r.state).collect();
        assert_eq!(short, vec![UiState::Captcha, UiState::Pin]);
    }

    #[test]
    fn captcha_is_detected_by_start_point_templates() {
        let captcha = LADDER.iter().find(|r| r.state == UiState::Captcha).unwrap();
        assert_eq!(captcha.templates, TemplateKind::StartPoint);
    }
}
