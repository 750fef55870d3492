use crate::domain::model::{Child, Id};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildResolution {
    Matched(Id),
    NoMatch(String),
    NoHint,
}

impl ChildResolution {
    pub fn child_id(&self) -> Option<Id> {
        match self {
            ChildResolution::Matched(id) => Some(*id),
            _ => None,
        }
    }
}

/// 不分大小寫的完全比對，不做模糊比對
pub fn resolve_child(hint: Option<&str>, children: &[Child]) -> ChildResolution {
    let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) else {
        return ChildResolution::NoHint;
    };

    let wanted = hint.to_lowercase();
    children
        .iter()
        .find(|child| child.name.trim().to_lowercase() == wanted)
        .map(|child| ChildResolution::Matched(child.id))
        .unwrap_or_else(|| ChildResolution::NoMatch(hint.to_string()))
}
