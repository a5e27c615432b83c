//! Trigger condition: how the triggers of an automation combine.
//!
//! Without a conditional, triggers are evaluated in declaration order and
//! combined with a short-circuiting AND. With a conditional, every trigger
//! is evaluated and the boolean notation decides.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TriggerDefinition;

/// Ordered triggers plus an optional boolean notation over their ids.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TriggerCondition {
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
    /// e.g. `"(trigger1 AND trigger2) OR trigger3"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<String>,
}

impl TriggerCondition {
    /// Trimmed conditional text, `None` when absent or blank.
    #[must_use]
    pub fn conditional(&self) -> Option<&str> {
        self.conditional
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    #[must_use]
    pub fn trigger(&self, id: &str) -> Option<&TriggerDefinition> {
        self.triggers.iter().find(|t| t.id == id)
    }

    pub fn trigger_mut(&mut self, id: &str) -> Option<&mut TriggerDefinition> {
        self.triggers.iter_mut().find(|t| t.id == id)
    }
}

impl fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(conditional) = self.conditional() {
            return f.write_str(conditional);
        }
        for (i, trigger) in self.triggers.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            f.write_str(trigger.label())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(conditional: Option<&str>) -> TriggerCondition {
        TriggerCondition {
            triggers: vec![
                TriggerDefinition::new("scheduled", "t1").with_description("Every hour"),
                TriggerDefinition::new("sql", "t2"),
            ],
            conditional: conditional.map(str::to_string),
        }
    }

    #[test]
    fn should_render_joined_descriptions_without_conditional() {
        assert_eq!(condition(None).to_string(), "Every hour AND t2");
    }

    #[test]
    fn should_render_conditional_text_when_present() {
        assert_eq!(condition(Some("t1 OR t2")).to_string(), "t1 OR t2");
    }

    #[test]
    fn should_treat_blank_conditional_as_absent() {
        let c = condition(Some("   "));
        assert_eq!(c.conditional(), None);
        assert_eq!(c.to_string(), "Every hour AND t2");
    }

    #[test]
    fn should_find_and_mutate_trigger_by_id() {
        let mut c = condition(None);
        assert!(c.trigger("t2").is_some());
        assert!(c.trigger("nope").is_none());
        c.trigger_mut("t1").unwrap().disable();
        assert!(!c.trigger("t1").unwrap().is_enabled());
    }

    #[test]
    fn should_skip_missing_conditional_when_serializing() {
        let json = serde_json::to_value(condition(None)).unwrap();
        assert!(json.get("conditional").is_none());
        assert_eq!(json["triggers"].as_array().unwrap().len(), 2);
    }
}
