use unicode_segmentation::UnicodeSegmentation;

/// Grapheme-aware Levenshtein distance. Used by the fuzzy candidate tier,
/// where the unit of a typo is a user-perceived character.
pub fn edit_distance(a: &str, b: &str) -> usize {
	let a: Vec<&str> = a.graphemes(true).collect();
	let b: Vec<&str> = b.graphemes(true).collect();

	if a.is_empty() {
		return b.len();
	}
	if b.is_empty() {
		return a.len();
	}

	let mut prev: Vec<usize> = (0..=b.len()).collect();
	let mut curr = vec![0_usize; b.len() + 1];

	for (i, ga) in a.iter().enumerate() {
		curr[0] = i + 1;

		for (j, gb) in b.iter().enumerate() {
			let substitution = prev[j] + usize::from(ga != gb);

			curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
		}

		std::mem::swap(&mut prev, &mut curr);
	}

	prev[b.len()]
}

/// Retrieval-side text score, tuned for partial and substring mentions
/// rather than typos: exact match 1.0, containment scaled by relative
/// length, otherwise token overlap capped at 0.6.
pub fn text_match_score(query: &str, name: &str) -> f32 {
	let query_norm = query.trim().to_lowercase();
	let name_norm = name.trim().to_lowercase();

	if query_norm.is_empty() || name_norm.is_empty() {
		return 0.0;
	}
	if query_norm == name_norm {
		return 1.0;
	}
	if query_norm.contains(&name_norm) || name_norm.contains(&query_norm) {
		let shorter = query_norm.chars().count().min(name_norm.chars().count()) as f32;
		let longer = query_norm.chars().count().max(name_norm.chars().count()) as f32;

		return 0.7 + 0.3 * (shorter / longer);
	}

	token_overlap_ratio(&query_norm, &name_norm).min(0.6)
}

fn token_overlap_ratio(a: &str, b: &str) -> f32 {
	let a_tokens: Vec<&str> = a.split_whitespace().collect();
	let b_tokens: Vec<&str> = b.split_whitespace().collect();

	if a_tokens.is_empty() || b_tokens.is_empty() {
		return 0.0;
	}

	let matched = a_tokens.iter().filter(|token| b_tokens.contains(token)).count();

	matched as f32 / a_tokens.len().max(b_tokens.len()) as f32
}
