/// Picks the candidate closest to `target` by edit distance, if any is close enough.
pub fn find_best_match<I, S>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let threshold = if target.chars().count() < 3 { 1 } else { 3 };
    let mut best: Option<(usize, String)> = None;

    for candidate in candidates {
        let candidate = candidate.as_ref();
        if candidate == target {
            continue;
        }
        let distance = levenshtein_distance(target, candidate);
        if distance > threshold {
            continue;
        }
        // ties keep the alphabetically first candidate so suggestions are stable
        let better = match &best {
            None => true,
            Some((best_distance, best_name)) => {
                distance < *best_distance
                    || (distance == *best_distance && candidate < best_name.as_str())
            }
        };
        if better {
            best = Some((distance, candidate.to_string()));
        }
    }

    best.map(|(_, name)| name)
}

pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let right: Vec<char> = s2.chars().collect();
    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0; right.len() + 1];

    for (i, left) in s1.chars().enumerate() {
        current[0] = i + 1;
        for (j, other) in right.iter().enumerate() {
            let cost = usize::from(left != *other);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_counts_edits() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn suggests_close_names_only() {
        let names = ["total", "count", "result"];
        assert_eq!(find_best_match("totl", names), Some("total".to_string()));
        assert_eq!(find_best_match("zzzzzzzz", names), None);
    }
}
