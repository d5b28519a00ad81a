use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::kind::NodeKind;

/// Collapses whitespace, strips case, and applies NFKC so visually
/// equivalent spellings derive the same entity key.
pub fn normalize_name(input: &str) -> String {
	input
		.nfkc()
		.collect::<String>()
		.split_whitespace()
		.collect::<Vec<_>>()
		.join(" ")
		.to_lowercase()
}

/// Deterministic first-creation key for a node. Derived from the owning
/// user, the node kind, and the normalized name; renames after creation do
/// not re-derive it.
pub fn entity_key_for(user_id: &str, kind: NodeKind, name: &str) -> Uuid {
	let name = format!("{user_id}:{}:{}", kind.as_str(), normalize_name(name));

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Key of the user's distinguished owner node. One per user, independent of
/// any mention name.
pub fn owner_entity_key(user_id: &str) -> Uuid {
	let name = format!("{user_id}:owner");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
