/// Card filter for the board search box.
///
/// A read-only projection: the query is trimmed and folded (lowercase, accents
/// stripped), a card matches when its content contains the query, and columns
/// left without any matching card are dropped. A blank query keeps everything.
use unicode_normalization::UnicodeNormalization;

use crate::types::{Card, Column, Desk};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFilter {
    needle: String,
}

impl CardFilter {
    pub fn compile(raw_query: &str) -> Self {
        Self {
            needle: normalize_for_search(raw_query.trim()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, card: &Card) -> bool {
        self.is_empty() || normalize_for_search(&card.content).contains(&self.needle)
    }

    /// Columns of `desk` in order, each holding only its matching cards.
    pub fn apply(&self, desk: &Desk) -> Vec<Column> {
        if self.is_empty() {
            return desk.columns.clone();
        }
        desk.columns
            .iter()
            .filter_map(|column| {
                let cards: Vec<Card> = column
                    .cards
                    .iter()
                    .filter(|card| self.matches(card))
                    .cloned()
                    .collect();
                (!cards.is_empty()).then(|| Column {
                    id: column.id.clone(),
                    title: column.title.clone(),
                    cards,
                })
            })
            .collect()
    }
}

fn normalize_for_search(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, content: &str) -> Card {
        Card {
            id: id.to_string(),
            content: content.to_string(),
            img: String::new(),
            done: false,
        }
    }

    fn desk() -> Desk {
        Desk {
            id: "desk_1".to_string(),
            title: "Main".to_string(),
            columns: vec![
                Column {
                    id: "col_todo".to_string(),
                    title: "Todo".to_string(),
                    cards: vec![card("c1", "Buy Milk"), card("c2", "Call plumber")],
                },
                Column {
                    id: "col_done".to_string(),
                    title: "Done".to_string(),
                    cards: vec![card("c3", "Résumé update")],
                },
                Column {
                    id: "col_empty".to_string(),
                    title: "Later".to_string(),
                    cards: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_blank_query_keeps_everything() {
        for query in ["", "   "] {
            let filter = CardFilter::compile(query);
            assert!(filter.is_empty());
            assert_eq!(filter.apply(&desk()), desk().columns);
        }
    }

    #[test]
    fn test_query_is_case_folded_and_trimmed() {
        let columns = CardFilter::compile("  MILK ").apply(&desk());
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].id, "col_todo");
        assert_eq!(columns[0].cards.len(), 1);
        assert_eq!(columns[0].cards[0].id, "c1");
    }

    #[test]
    fn test_accents_are_ignored() {
        let columns = CardFilter::compile("resume").apply(&desk());
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].cards[0].id, "c3");
    }

    #[test]
    fn test_columns_without_matches_are_hidden() {
        let columns = CardFilter::compile("l").apply(&desk());
        let ids: Vec<&str> = columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["col_todo"]);
        assert_eq!(columns[0].cards.len(), 2);

        assert!(CardFilter::compile("nothing like this").apply(&desk()).is_empty());
    }
}
