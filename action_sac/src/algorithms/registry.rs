//! Closed mapping from algorithm names to policy builders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use urgym::ActionLayout;

use super::sac::{NetArch, PolicyConfig};
use crate::error::{Error, Result};
use crate::nn::ActionConfig;

/// Trainable algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// SAC with a standard MLP actor.
    #[serde(rename = "SAC")]
    Sac,
    /// SAC whose actor produces each action group with its own head.
    #[serde(rename = "ActionSAC")]
    ActionSac,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Sac, Algorithm::ActionSac];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Sac => "SAC",
            Algorithm::ActionSac => "ActionSAC",
        }
    }

    /// Case-insensitive lookup; unknown names list the allowed ones.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownAlgorithm {
                name: name.to_string(),
                allowed: Self::allowed(),
            })
    }

    /// Allowed names, comma separated.
    pub fn allowed() -> String {
        Self::ALL.map(|a| a.name()).join(", ")
    }

    pub fn is_factored(&self) -> bool {
        matches!(self, Algorithm::ActionSac)
    }

    /// Policy architecture for an environment with `layout` and `action_dim`.
    ///
    /// `hidden` is the width of every hidden layer: the actor and critic
    /// layers for SAC, the per-group heads and critic layers for ActionSAC.
    pub fn policy_config(&self, layout: ActionLayout, action_dim: usize, hidden: usize) -> PolicyConfig {
        match self {
            Algorithm::Sac => PolicyConfig::new().with_net_arch(NetArch::shared(vec![hidden, hidden])),
            Algorithm::ActionSac => PolicyConfig::factored(
                ActionConfig::for_layout(layout, action_dim, hidden),
                action_dim,
                vec![hidden, hidden],
            ),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(Algorithm::from_name("sac").unwrap(), Algorithm::Sac);
        assert_eq!(Algorithm::from_name("ACTIONSAC").unwrap(), Algorithm::ActionSac);
        assert_eq!("ActionSAC".parse::<Algorithm>().unwrap(), Algorithm::ActionSac);
    }

    #[test]
    fn test_unknown_name_lists_allowed() {
        let err = Algorithm::from_name("PPO").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PPO"));
        assert!(msg.contains("SAC"));
        assert!(msg.contains("ActionSAC"));
    }

    #[test]
    fn test_policy_configs() {
        let sac = Algorithm::Sac.policy_config(ActionLayout::JointGripper, 7, 64);
        assert!(!sac.is_factored());
        assert_eq!(sac.net_arch.pi, vec![64, 64]);

        let factored = Algorithm::ActionSac.policy_config(ActionLayout::JointGripper, 7, 256);
        assert!(factored.validate(7).is_ok());
        assert_eq!(factored.net_arch.pi, vec![7]);
        assert_eq!(factored.net_arch.qf, vec![256, 256]);
        assert_eq!(factored.action_config.unwrap().n_nodes, 256);
    }
}
