use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub content: String,
    /// Image URL. Empty string means the card has no image.
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub done: bool,
}

impl Card {
    pub fn image(&self) -> Option<&str> {
        if self.img.trim().is_empty() {
            None
        } else {
            Some(&self.img)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desk {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Desk {
    pub fn column(&self, col_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == col_id)
    }
}

/// The whole persisted and synced document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootState {
    pub desks: Vec<Desk>,
    #[serde(default)]
    pub active_desk_id: Option<String>,
}

impl RootState {
    pub fn desk(&self, desk_id: &str) -> Option<&Desk> {
        self.desks.iter().find(|d| d.id == desk_id)
    }

    pub fn active_desk(&self) -> Option<&Desk> {
        self.active_desk_id.as_deref().and_then(|id| self.desk(id))
    }

    pub fn card_count(&self) -> usize {
        self.desks
            .iter()
            .flat_map(|d| d.columns.iter())
            .map(|c| c.cards.len())
            .sum()
    }

    /// Parse a persisted document, accepting it only if it has the board shape.
    /// Returns None for anything that is not an object with a `desks` array.
    pub fn from_document(doc: &serde_json::Value) -> Option<Self> {
        let desks = doc.as_object()?.get("desks")?;
        if !desks.is_array() {
            return None;
        }
        match serde_json::from_value::<RootState>(doc.clone()) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("[krello.types] Board document has invalid entries: {}", e);
                None
            }
        }
    }

    /// Parse the local text format (JSON), with the same shape check.
    pub fn from_json_str(raw: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(doc) => Self::from_document(&doc),
            Err(e) => {
                log::warn!("[krello.types] Corrupt board text: {}", e);
                None
            }
        }
    }
}

/// Identity handed over by the sign-in provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }
}
