use serde::{Deserialize, Serialize};

/// Salience assigned to a node at creation.
pub const INITIAL_SALIENCE: f32 = 0.5;
/// Access count at which a node leaves `Candidate`.
pub const ACTIVE_ACCESS_THRESHOLD: i64 = 1;
/// Access count at which a node becomes `Core`.
pub const CORE_ACCESS_THRESHOLD: i64 = 10;

/// Lifecycle state of a node. Transitions are monotonic: a node never moves
/// back toward `Candidate`, whatever its later access pattern.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
	Candidate,
	Active,
	Core,
}

impl NodeState {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Candidate => "candidate",
			Self::Active => "active",
			Self::Core => "core",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"candidate" => Some(Self::Candidate),
			"active" => Some(Self::Active),
			"core" => Some(Self::Core),
			_ => None,
		}
	}
}

/// State a given access count maps to, ignoring history.
pub fn state_for_access_count(access_count: i64) -> NodeState {
	if access_count >= CORE_ACCESS_THRESHOLD {
		NodeState::Core
	} else if access_count >= ACTIVE_ACCESS_THRESHOLD {
		NodeState::Active
	} else {
		NodeState::Candidate
	}
}

/// Next state after a read. Monotonic: the derived state never undercuts
/// the current one.
pub fn advance_state(current: NodeState, access_count: i64) -> NodeState {
	current.max(state_for_access_count(access_count))
}

/// Salience after one read, clamped to 1.0.
pub fn boosted_salience(salience: f32, boost: f32) -> f32 {
	(salience + boost).min(1.0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn thresholds_drive_state() {
		assert_eq!(state_for_access_count(0), NodeState::Candidate);
		assert_eq!(state_for_access_count(1), NodeState::Active);
		assert_eq!(state_for_access_count(9), NodeState::Active);
		assert_eq!(state_for_access_count(10), NodeState::Core);
	}

	#[test]
	fn state_never_regresses() {
		assert_eq!(advance_state(NodeState::Core, 0), NodeState::Core);
		assert_eq!(advance_state(NodeState::Active, 0), NodeState::Active);
		assert_eq!(advance_state(NodeState::Candidate, 1), NodeState::Active);
	}

	#[test]
	fn boost_saturates_at_one() {
		assert!((boosted_salience(0.5, 0.075) - 0.575).abs() < f32::EPSILON);
		assert!((boosted_salience(0.98, 0.075) - 1.0).abs() < f32::EPSILON);
	}

	#[test]
	fn states_round_trip_labels() {
		for state in [NodeState::Candidate, NodeState::Active, NodeState::Core] {
			assert_eq!(NodeState::parse(state.as_str()), Some(state));
		}
	}
}
