use serde::{Deserialize, Serialize};

/// What a graph node represents. `Owner` is the distinguished node standing
/// for the user themself; it is never produced by resolution and never
/// embedded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
	Person,
	Concept,
	Entity,
	Owner,
}

/// Per-kind configuration for the shared node pipeline: which kinds take
/// part in resolution/retrieval, and how their embedding input is rendered.
#[derive(Clone, Copy, Debug)]
pub struct KindProfile {
	pub kind: NodeKind,
	pub label: &'static str,
	pub resolvable: bool,
}

const PROFILES: [KindProfile; 4] = [
	KindProfile { kind: NodeKind::Person, label: "Person", resolvable: true },
	KindProfile { kind: NodeKind::Concept, label: "Concept", resolvable: true },
	KindProfile { kind: NodeKind::Entity, label: "Entity", resolvable: true },
	KindProfile { kind: NodeKind::Owner, label: "Owner", resolvable: false },
];

impl NodeKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Person => "person",
			Self::Concept => "concept",
			Self::Entity => "entity",
			Self::Owner => "owner",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"person" => Some(Self::Person),
			"concept" => Some(Self::Concept),
			"entity" => Some(Self::Entity),
			"owner" => Some(Self::Owner),
			_ => None,
		}
	}

	pub fn profile(&self) -> KindProfile {
		PROFILES[match self {
			Self::Person => 0,
			Self::Concept => 1,
			Self::Entity => 2,
			Self::Owner => 3,
		}]
	}

	pub fn resolvable_kinds() -> impl Iterator<Item = NodeKind> {
		PROFILES.iter().filter(|profile| profile.resolvable).map(|profile| profile.kind)
	}
}

impl KindProfile {
	/// Renders the text embedded for a node of this kind. Name, description
	/// and notes all feed the vector, so any change to them requires
	/// re-embedding.
	pub fn embedding_input(&self, name: &str, description: &str, notes: &[String]) -> String {
		let mut out = format!("{}: {name}", self.label);

		let description = description.trim();

		if !description.is_empty() {
			out.push('\n');
			out.push_str(description);
		}
		if !notes.is_empty() {
			out.push_str("\nNotes:");

			for note in notes {
				out.push_str("\n- ");
				out.push_str(note);
			}
		}

		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_kind_labels() {
		assert_eq!(NodeKind::parse("person"), Some(NodeKind::Person));
		assert_eq!(NodeKind::parse(" Concept "), Some(NodeKind::Concept));
		assert_eq!(NodeKind::parse("unknown"), None);
	}

	#[test]
	fn owner_is_not_resolvable() {
		assert!(!NodeKind::Owner.profile().resolvable);
		assert!(NodeKind::resolvable_kinds().all(|kind| kind != NodeKind::Owner));
	}

	#[test]
	fn embedding_input_includes_notes() {
		let profile = NodeKind::Person.profile();
		let input = profile.embedding_input(
			"Alex",
			"A colleague from the data team.",
			&["Prefers async communication.".to_string()],
		);

		assert!(input.starts_with("Person: Alex"));
		assert!(input.contains("A colleague from the data team."));
		assert!(input.contains("- Prefers async communication."));
	}

	#[test]
	fn embedding_input_skips_empty_sections() {
		let profile = NodeKind::Concept.profile();

		assert_eq!(profile.embedding_input("Rust", "  ", &[]), "Concept: Rust");
	}
}
