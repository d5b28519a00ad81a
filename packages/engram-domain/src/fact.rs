use serde::{Deserialize, Serialize};

/// Side of the intrinsic/relational split a fact belongs to. Intrinsic
/// facts describe what the entity *is* and land on the node; relational
/// facts describe how the user relates to it and land on the owner edge.
/// Writing the same fact to both sides is a correctness bug at the call
/// site, not a style choice.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactClass {
	Intrinsic,
	Relational,
}

/// One classified fact extracted about a mention.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fact {
	pub class: FactClass,
	pub content: String,
	/// Required for relational facts: the edge type connecting the owner
	/// node to the entity.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub relationship_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub relevance: Option<f32>,
}

impl Fact {
	pub fn intrinsic(content: impl Into<String>) -> Self {
		Self { class: FactClass::Intrinsic, content: content.into(), relationship_type: None, relevance: None }
	}

	pub fn relational(content: impl Into<String>, relationship_type: impl Into<String>) -> Self {
		Self {
			class: FactClass::Relational,
			content: content.into(),
			relationship_type: Some(relationship_type.into()),
			relevance: None,
		}
	}
}

/// Splits facts by class, preserving order within each side.
pub fn partition(facts: &[Fact]) -> (Vec<&Fact>, Vec<&Fact>) {
	facts.iter().partition(|fact| fact.class == FactClass::Intrinsic)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partition_routes_by_class() {
		let facts = vec![
			Fact::intrinsic("Works on the data team."),
			Fact::relational("Met at the Austin offsite.", "knows"),
			Fact::intrinsic("Based in Lisbon."),
		];
		let (intrinsic, relational) = partition(&facts);

		assert_eq!(intrinsic.len(), 2);
		assert_eq!(relational.len(), 1);
		assert_eq!(relational[0].relationship_type.as_deref(), Some("knows"));
	}
}
