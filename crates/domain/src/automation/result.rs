//! Automation result: the verdict of a trigger or of a whole automation.

use serde::{Deserialize, Serialize};

use super::Parameters;

/// Met / not met, plus the parameters produced alongside the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutomationResult {
    is_met: bool,
    task_parameters: Parameters,
}

impl AutomationResult {
    #[must_use]
    pub fn met(task_parameters: Parameters) -> Self {
        Self {
            is_met: true,
            task_parameters,
        }
    }

    #[must_use]
    pub fn not_met() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_met(&self) -> bool {
        self.is_met
    }

    #[must_use]
    pub fn task_parameters(&self) -> &Parameters {
        &self.task_parameters
    }

    #[must_use]
    pub fn into_task_parameters(self) -> Parameters {
        self.task_parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_carry_parameters_when_met() {
        let params = Parameters::from([("a".to_string(), "1".to_string())]);
        let result = AutomationResult::met(params.clone());
        assert!(result.is_met());
        assert_eq!(result.task_parameters(), &params);
        assert_eq!(result.into_task_parameters(), params);
    }

    #[test]
    fn should_be_empty_when_not_met() {
        let result = AutomationResult::not_met();
        assert!(!result.is_met());
        assert!(result.task_parameters().is_empty());
    }
}
