use std::collections::HashMap;

/// Blind display names, handed out in first-request order.
#[derive(Debug, Default)]
pub struct ModelLabels {
    reveal: bool,
    assigned: HashMap<String, String>,
}

impl ModelLabels {
    pub fn new(reveal: bool) -> Self {
        Self {
            reveal,
            assigned: HashMap::new(),
        }
    }

    pub fn label(&mut self, model: &str) -> String {
        if self.reveal {
            return model.to_string();
        }
        let next = self.assigned.len();
        self.assigned
            .entry(model.to_string())
            .or_insert_with(|| format!("Model {}", column_letters(next)))
            .clone()
    }
}

/// 0 -> "A", 25 -> "Z", 26 -> "AA", 27 -> "AB", ...
pub fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_continue_past_z() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn labels_are_stable_per_model() {
        let mut labels = ModelLabels::new(false);
        assert_eq!(labels.label("gpt-4o"), "Model A");
        assert_eq!(labels.label("deepseek-chat"), "Model B");
        assert_eq!(labels.label("gpt-4o"), "Model A");
    }

    #[test]
    fn reveal_uses_model_names() {
        let mut labels = ModelLabels::new(true);
        assert_eq!(labels.label("gpt-4o"), "gpt-4o");
    }
}
