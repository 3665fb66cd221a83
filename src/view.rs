use crate::{
    config::{
        UPGRADE_AMOUNT,
        UPGRADE_COST,
    },
    countdown::countdown_text,
    purchase::amount_to_buy,
    store::RefreshState,
};

pub const BUY_LABEL: &str = "Buy max charges";
pub const FULL_TEXT: &str = "Currently full!";

/// What the panel shows, derived fresh from the refresh state on every render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayState {
    Depleted,
    FullAffordable,
    FullUnaffordable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CountdownText {
    Full,
    Remaining(String),
}

impl CountdownText {
    pub fn line(&self) -> String {
        match self {
            CountdownText::Full => FULL_TEXT.to_string(),
            CountdownText::Remaining(time) => format!("{time} until full"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseAffordance {
    pub visible: bool,
    pub enabled: bool,
    pub label: String,
    pub hint_text: Option<String>,
}

impl PurchaseAffordance {
    fn hidden() -> Self {
        Self {
            visible: false,
            enabled: false,
            label: BUY_LABEL.to_string(),
            hint_text: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayModel {
    pub state: DisplayState,
    pub countdown: CountdownText,
    pub purchase: PurchaseAffordance,
    pub info_lines: Vec<String>,
    pub droplets: u64,
    /// the snapshot is older than the staleness threshold
    pub stale: bool,
}

impl OverlayModel {
    pub fn build(refresh: &RefreshState, now_ms: i64, stale_after_ms: i64) -> Self {
        let snapshot = &refresh.snapshot;
        let countdown = match countdown_text(refresh, now_ms) {
            Some(time) => CountdownText::Remaining(time),
            None => CountdownText::Full,
        };
        let amount = amount_to_buy(snapshot);
        let state = match (snapshot.is_full(), amount > 0) {
            (false, _) => DisplayState::Depleted,
            (true, true) => DisplayState::FullAffordable,
            (true, false) => DisplayState::FullUnaffordable,
        };

        let mut info_lines = vec![countdown.line()];
        let purchase = if amount > 0 {
            info_lines.push(format!(
                "Can buy +{} max charge upgrades ({} droplets)",
                amount * UPGRADE_AMOUNT,
                amount * UPGRADE_COST
            ));
            PurchaseAffordance {
                visible: true,
                enabled: true,
                label: BUY_LABEL.to_string(),
                hint_text: None,
            }
        } else if state == DisplayState::FullUnaffordable {
            let needed = UPGRADE_COST - snapshot.droplets % UPGRADE_COST;
            let hint = format!(
                "+{UPGRADE_AMOUNT} max charge upgrade costs {UPGRADE_COST} droplets (need {needed} more)"
            );
            info_lines.push(hint.clone());
            PurchaseAffordance {
                visible: true,
                enabled: false,
                label: BUY_LABEL.to_string(),
                hint_text: Some(hint),
            }
        } else {
            PurchaseAffordance::hidden()
        };

        Self {
            state,
            countdown,
            purchase,
            info_lines,
            droplets: snapshot.droplets,
            stale: refresh.age_ms(now_ms) > stale_after_ms,
        }
    }
}
