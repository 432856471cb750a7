use serde::{Deserialize, Serialize};

/// Which intake variant the draft runs through. Linked drafts start from
/// product links; manual drafts start from free-text shop details and a
/// scratch item edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Linked,
    Manual,
}

impl Default for FlowKind {
    fn default() -> Self {
        FlowKind::Linked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    LinkInput,
    ContactInfo,
    RequestItems,
    Confirmation,
    Success,
}

impl Step {
    pub fn first(flow: FlowKind) -> Self {
        match flow {
            FlowKind::Linked => Step::LinkInput,
            FlowKind::Manual => Step::ContactInfo,
        }
    }

    /// `Success` ends the draft's lifetime; a fresh draft re-enters the flow.
    pub fn is_terminal(self) -> bool {
        self == Step::Success
    }

    /// The step reached by the advance control, or `None` when the control
    /// is disabled. Leaving `RequestItems` requires at least one item; no
    /// other state carries a guard.
    pub fn advance(self, has_items: bool) -> Option<Step> {
        match self {
            Step::LinkInput | Step::ContactInfo => Some(Step::RequestItems),
            Step::RequestItems if has_items => Some(Step::Confirmation),
            Step::RequestItems => None,
            Step::Confirmation => Some(Step::Success),
            Step::Success => None,
        }
    }

    /// Walks the chain in reverse. The first step and `Success` stay put.
    pub fn back(self, flow: FlowKind) -> Step {
        match self {
            Step::RequestItems => Step::first(flow),
            Step::Confirmation => Step::RequestItems,
            other => other,
        }
    }
}
